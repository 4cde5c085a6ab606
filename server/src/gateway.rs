use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

use jirai_core::{Game, GameError, GameMode, MoveOutcome, Player, PlayerId, Strategy};
use jirai_protocol::{ClientMessage, FirstMove, ServerMessage};

use crate::auth::{Authenticator, Identity, anonymous_identity};
use crate::bot::BotSupervisor;
use crate::registry::{GameRegistry, RemovedGame};

/// Process-wide server state. The registry and connection table are the only
/// shared mutable pieces; games carry their own mutex.
///
/// Lock order: registry or connections first, then a game — never a game lock
/// held across a registry acquisition.
pub struct ServerState {
    pub registry: Mutex<GameRegistry>,
    connections: Mutex<HashMap<PlayerId, UnboundedSender<ServerMessage>>>,
    authenticator: Box<dyn Authenticator>,
    bots: BotSupervisor,
    pub game_ttl: Duration,
}

pub type SharedState = Arc<ServerState>;

impl ServerState {
    pub fn new(
        authenticator: Box<dyn Authenticator>,
        bots: BotSupervisor,
        game_ttl: Duration,
    ) -> Self {
        Self {
            registry: Mutex::new(GameRegistry::new()),
            connections: Mutex::new(HashMap::new()),
            authenticator,
            bots,
            game_ttl,
        }
    }
}

/// Domain-rule rejection: surfaced to the requesting connection only, never
/// broadcast, never fatal.
#[derive(Error, Debug)]
enum Rejection {
    #[error("game not found")]
    GameNotFound,
    #[error("you are not in a game")]
    NotInGame,
    #[error("player not found")]
    PlayerNotFound,
    #[error("only bots can be kicked")]
    NotABot,
    #[error("failed to summon bot: {0}")]
    BotSpawn(io::Error),
    #[error(transparent)]
    Game(#[from] GameError),
}

/// One task per connection: authenticate, replay the current game if any,
/// then dispatch inbound frames until the peer goes away.
pub async fn handle_connection(state: SharedState, stream: TcpStream, peer: SocketAddr) {
    let mut query = None;
    let ws = match accept_hdr_async(stream, |req: &Request, resp: Response| {
        query = req.uri().query().map(str::to_string);
        Ok(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(err) => {
            log::debug!("handshake with {peer} failed: {err}");
            return;
        }
    };

    let (token, name_hint) = parse_query(query.as_deref().unwrap_or(""));
    let identity = token
        .as_deref()
        .and_then(|t| state.authenticator.verify(t))
        .unwrap_or_else(|| anonymous_identity(name_hint.as_deref()));
    log::info!("{peer} connected as {} ({})", identity.name, identity.id);

    let (mut sink, mut inbound) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(err) => {
                    log::warn!("failed to encode outbound message: {err}");
                    continue;
                }
            };
            if sink.send(WsMessage::text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    state
        .connections
        .lock()
        .await
        .insert(identity.id.clone(), tx.clone());

    // Session persistence: reconnecting lands back in the running game.
    if let Some(shared) = state.registry.lock().await.game_for(&identity.id) {
        let view = shared.lock().await.snapshot();
        send_to(&state, &identity.id, ServerMessage::GameStart { view }).await;
    }

    while let Some(frame) = inbound.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("{}: receive error: {err}", identity.id);
                break;
            }
        };
        match frame {
            WsMessage::Text(text) => {
                // Malformed frames are dropped; one bad client message must
                // never take a session down.
                let Ok(msg) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                    log::debug!("{}: dropping undecodable frame", identity.id);
                    continue;
                };
                if let Err(rejection) = dispatch(&state, &identity, msg).await {
                    send_to(
                        &state,
                        &identity.id,
                        ServerMessage::Error {
                            message: rejection.to_string(),
                        },
                    )
                    .await;
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    deregister(&state, &identity.id, &tx).await;
    log::info!("{} disconnected", identity.id);
}

/// End-of-connection cleanup. A reconnect replaces the map entry, so only the
/// sender belonging to this connection may be removed; a stale task exiting
/// late must not evict its successor.
async fn deregister(state: &SharedState, player: &PlayerId, tx: &UnboundedSender<ServerMessage>) {
    let mut connections = state.connections.lock().await;
    if connections
        .get(player)
        .is_some_and(|current| current.same_channel(tx))
    {
        connections.remove(player);
    }
}

async fn dispatch(
    state: &SharedState,
    identity: &Identity,
    msg: ClientMessage,
) -> Result<(), Rejection> {
    match msg {
        ClientMessage::NewGame {
            difficulty,
            mode,
            invite_ids,
            first_move,
        } => new_game(state, identity, difficulty.config(), mode, invite_ids, first_move).await,
        ClientMessage::JoinGame { game_id } => join_game(state, identity, &game_id).await,
        ClientMessage::Reveal { x, y } => {
            play(state, identity, |game, actor| game.reveal((x, y), actor)).await
        }
        ClientMessage::Flag { x, y } => {
            play(state, identity, |game, _| game.toggle_flag((x, y))).await
        }
        ClientMessage::SummonBot { game_id } => summon_bot(state, identity, &game_id).await,
        ClientMessage::KickPlayer { target_id } => kick_player(state, identity, &target_id).await,
        ClientMessage::RestartGame {
            game_id,
            difficulty,
        } => restart_game(state, &game_id, difficulty.map(|d| d.config())).await,
        ClientMessage::LeaveGame { game_id } => leave_game(state, &game_id).await,
    }
}

async fn new_game(
    state: &SharedState,
    identity: &Identity,
    config: jirai_core::GameConfig,
    mode: GameMode,
    invite_ids: Vec<String>,
    first_move: Option<FirstMove>,
) -> Result<(), Rejection> {
    let creator = Player::new(identity.id.clone(), identity.name.clone());
    let invitees = invite_ids
        .into_iter()
        .map(|id| Player::new(id.clone(), id))
        .collect();

    let shared = state
        .registry
        .lock()
        .await
        .create_game(creator, config, mode, invitees);

    let mut first_move_rejection = None;
    let (view, players) = {
        let mut game = shared.lock().await;
        if let Some(FirstMove { x, y }) = first_move {
            if let Err(err) = game.reveal((x, y), &identity.id) {
                first_move_rejection = Some(err);
            }
        }
        (game.snapshot(), player_ids(&game))
    };

    broadcast(state, &players, ServerMessage::GameStart { view }).await;
    match first_move_rejection {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

async fn join_game(
    state: &SharedState,
    identity: &Identity,
    game_id: &str,
) -> Result<(), Rejection> {
    let shared = state
        .registry
        .lock()
        .await
        .join_game(game_id, &identity.id)
        .ok_or(Rejection::GameNotFound)?;

    let (view, players) = {
        let mut game = shared.lock().await;
        game.add_player(Player::new(identity.id.clone(), identity.name.clone()));
        (game.snapshot(), player_ids(&game))
    };

    broadcast(state, &players, ServerMessage::GameStart { view }).await;
    Ok(())
}

/// Common path for reveal/flag: run the move under the game lock, then fan
/// the delta out to every participant. Silent no-ops broadcast nothing.
async fn play<F>(state: &SharedState, identity: &Identity, action: F) -> Result<(), Rejection>
where
    F: FnOnce(&mut Game, &PlayerId) -> jirai_core::Result<MoveOutcome>,
{
    let shared = state
        .registry
        .lock()
        .await
        .game_for(&identity.id)
        .ok_or(Rejection::NotInGame)?;

    let (update, players) = {
        let mut game = shared.lock().await;
        let outcome = action(&mut game, &identity.id)?;
        if !outcome.has_update() {
            return Ok(());
        }
        (game_update(&game, outcome), player_ids(&game))
    };

    broadcast(state, &players, update).await;
    Ok(())
}

async fn summon_bot(
    state: &SharedState,
    identity: &Identity,
    game_id: &str,
) -> Result<(), Rejection> {
    let shared = state
        .registry
        .lock()
        .await
        .get(game_id)
        .ok_or(Rejection::GameNotFound)?;

    let (name, strategy, players) = {
        let game = shared.lock().await;
        let strategy = match game.mode() {
            GameMode::Flags => Strategy::Hunter,
            GameMode::Classic => Strategy::Classic,
        };
        (next_bot_name(game.players()), strategy, player_ids(&game))
    };

    state
        .bots
        .spawn(game_id, &name, strategy)
        .map_err(Rejection::BotSpawn)?;
    log::debug!("{} summoned {name} into {game_id}", identity.id);

    broadcast(state, &players, ServerMessage::BotSummoned { name }).await;
    Ok(())
}

async fn kick_player(
    state: &SharedState,
    identity: &Identity,
    target_id: &str,
) -> Result<(), Rejection> {
    let shared = state
        .registry
        .lock()
        .await
        .game_for(&identity.id)
        .ok_or(Rejection::NotInGame)?;

    let target_id = target_id.to_string();
    let (game_id, view, players) = {
        let mut game = shared.lock().await;
        let target = game
            .players()
            .iter()
            .find(|p| p.id == target_id)
            .ok_or(Rejection::PlayerNotFound)?;
        // Narrow authorization rule: humans cannot be kicked.
        if !is_bot_name(&target.name) {
            return Err(Rejection::NotABot);
        }
        game.remove_player(&target_id);
        (game.id().to_string(), game.snapshot(), player_ids(&game))
    };

    state.registry.lock().await.remove_player(&game_id, &target_id);
    disconnect(state, &target_id).await;

    broadcast(state, &players, ServerMessage::GameStart { view }).await;
    Ok(())
}

async fn restart_game(
    state: &SharedState,
    game_id: &str,
    config: Option<jirai_core::GameConfig>,
) -> Result<(), Rejection> {
    let shared = state
        .registry
        .lock()
        .await
        .get(game_id)
        .ok_or(Rejection::GameNotFound)?;

    let (view, players) = {
        let mut game = shared.lock().await;
        game.reset(config);
        (game.snapshot(), player_ids(&game))
    };

    broadcast(state, &players, ServerMessage::GameStart { view }).await;
    Ok(())
}

async fn leave_game(state: &SharedState, game_id: &str) -> Result<(), Rejection> {
    let removed = state
        .registry
        .lock()
        .await
        .remove_game(game_id)
        .ok_or(Rejection::GameNotFound)?;

    teardown_game(state, removed, "returned to lobby").await;
    Ok(())
}

/// Final notification pass for a destroyed game: bots are force-disconnected
/// (terminating their process), humans keep their transport and get a notice.
pub async fn teardown_game(state: &SharedState, removed: RemovedGame, reason: &str) {
    let participants = removed.game.lock().await.players().to_vec();
    for player in participants {
        if is_bot_name(&player.name) {
            disconnect(state, &player.id).await;
        } else {
            send_to(
                state,
                &player.id,
                ServerMessage::GameTerminated {
                    game_id: removed.game_id.clone(),
                    reason: reason.to_string(),
                },
            )
            .await;
        }
    }
}

/// Fire-and-forget fan-out. A dead recipient is torn down and logged; the
/// rest of the broadcast is unaffected.
async fn broadcast(state: &SharedState, players: &[PlayerId], msg: ServerMessage) {
    let mut connections = state.connections.lock().await;
    for player in players {
        if let Some(tx) = connections.get(player) {
            if tx.send(msg.clone()).is_err() {
                log::warn!("dropping dead connection for {player}");
                connections.remove(player);
            }
        }
    }
}

async fn send_to(state: &SharedState, player: &PlayerId, msg: ServerMessage) {
    let mut connections = state.connections.lock().await;
    if let Some(tx) = connections.get(player) {
        if tx.send(msg).is_err() {
            connections.remove(player);
        }
    }
}

/// Dropping the sender ends the writer task, which closes the socket.
async fn disconnect(state: &SharedState, player: &PlayerId) {
    if state.connections.lock().await.remove(player).is_some() {
        log::info!("force-disconnected {player}");
    }
}

fn game_update(game: &Game, outcome: MoveOutcome) -> ServerMessage {
    ServerMessage::GameUpdate {
        game_id: game.id().to_string(),
        state: outcome.state,
        cell_updates: outcome.cell_updates,
        scores: game.scores().clone(),
        current_turn: game.current_player().map(|p| p.id.clone()),
        mines_left: game.mines_left(),
        elapsed_secs: game.elapsed().as_secs(),
    }
}

fn player_ids(game: &Game) -> Vec<PlayerId> {
    game.players().iter().map(|p| p.id.clone()).collect()
}

/// `Bot <number>` is the reserved naming convention for autonomous players.
fn is_bot_name(name: &str) -> bool {
    name.strip_prefix("Bot ")
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

/// Next free bot name: one above the highest existing suffix, so names stay
/// unique even after earlier bots left.
fn next_bot_name(players: &[Player]) -> String {
    let highest = players
        .iter()
        .filter_map(|p| p.name.strip_prefix("Bot "))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("Bot {}", highest + 1)
}

fn parse_query(query: &str) -> (Option<String>, Option<String>) {
    let mut token = None;
    let mut name = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "token" => token = Some(percent_decode(value)),
            "name" => name = Some(percent_decode(value)),
            _ => {}
        }
    }
    (token, name)
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let digit = |b: u8| (b as char).to_digit(16).map(|d| d as u8);
    Some(digit(high)? * 16 + digit(low)?)
}
