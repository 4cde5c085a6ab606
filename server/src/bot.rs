use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use jirai_core::Strategy;

/// Default iteration budget handed to spawned bots.
pub const DEFAULT_MOVE_BUDGET: u32 = 500;

/// Launches autonomous players as separate processes speaking the same wire
/// protocol as any human client. Owns spawning only; termination happens via
/// the gateway's forced disconnect, and exit status is not interpreted.
pub struct BotSupervisor {
    program: PathBuf,
    server_url: String,
}

impl BotSupervisor {
    pub fn new(program: PathBuf, server_url: String) -> Self {
        Self {
            program,
            server_url,
        }
    }

    pub fn spawn(&self, game_id: &str, name: &str, strategy: Strategy) -> io::Result<()> {
        let child = Command::new(&self.program)
            .arg("--server")
            .arg(&self.server_url)
            .arg("--game-id")
            .arg(game_id)
            .arg("--name")
            .arg(name)
            .arg("--strategy")
            .arg(strategy.name())
            .arg("--max-moves")
            .arg(DEFAULT_MOVE_BUDGET.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        log::info!(
            "spawned {name} (pid {:?}, strategy {}) for game {game_id}",
            child.id(),
            strategy.name()
        );
        Ok(())
    }
}
