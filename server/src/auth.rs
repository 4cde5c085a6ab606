use rand::Rng;

use jirai_core::PlayerId;

/// Resolved identity of one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: PlayerId,
    pub name: String,
}

/// Boundary to the external token service. A `None` from `verify` is not a
/// refusal: the gateway degrades to an anonymous identity.
pub trait Authenticator: Send + Sync {
    fn verify(&self, token: &str) -> Option<Identity>;
}

/// Default authenticator: accepts no token, so everyone plays anonymously.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnonymousOnly;

impl Authenticator for AnonymousOnly {
    fn verify(&self, _token: &str) -> Option<Identity> {
        None
    }
}

/// Fresh ephemeral identity. The display-name hint lets programmatic clients
/// (bots) pick their own name; humans without a token get a generated one.
pub fn anonymous_identity(name_hint: Option<&str>) -> Identity {
    let tag: u32 = rand::rng().random_range(0..0x1000000);
    let name = match name_hint.filter(|hint| !hint.trim().is_empty()) {
        Some(hint) => hint.trim().to_string(),
        None => format!("Guest {tag:06x}"),
    };
    Identity {
        id: format!("guest-{tag:06x}"),
        name,
    }
}
