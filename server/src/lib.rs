//! Multiplayer minesweeper server: session registry, realtime WebSocket
//! gateway, and the supervisor that launches autonomous bot players.

pub use auth::{AnonymousOnly, Authenticator, Identity};
pub use bot::BotSupervisor;
pub use gateway::{ServerState, SharedState, handle_connection, teardown_game};
pub use registry::{GameRegistry, RemovedGame, SharedGame};

pub mod auth;
pub mod bot;
pub mod gateway;
pub mod registry;
