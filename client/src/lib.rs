//! Client-side plumbing for the multiplayer minesweeper server: a WebSocket
//! wrapper speaking the tagged JSON protocol, and a board mirror that keeps a
//! local [`GameView`] in sync from snapshots and deltas.

use futures_util::{SinkExt, StreamExt};
use ndarray::Array2;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use jirai_core::{Cell, Coord, GameView, nd};
use jirai_protocol::{ClientMessage, ServerMessage};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection closed by server")]
    Closed,
}

/// What a server frame meant, after the mirror has absorbed it.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A full snapshot arrived; the mirrored view was replaced wholesale.
    Started,
    /// A delta arrived and was applied to the mirrored view.
    Updated,
    /// The server rejected our last message.
    Rejected(String),
    BotSummoned(String),
    /// The game is gone; the mirrored view was cleared.
    Terminated(String),
}

/// Local copy of the server's viewer projection.
///
/// Snapshots replace it wholesale; deltas patch cells, scores, turn, and the
/// counters in place. Deltas for an unknown or different game are dropped.
#[derive(Debug, Default)]
pub struct ViewMirror {
    view: Option<GameView>,
}

impl ViewMirror {
    pub fn view(&self) -> Option<&GameView> {
        self.view.as_ref()
    }

    pub fn absorb(&mut self, msg: ServerMessage) -> Event {
        match msg {
            ServerMessage::GameStart { view } => {
                self.view = Some(view);
                Event::Started
            }
            ServerMessage::GameUpdate {
                game_id,
                state,
                cell_updates,
                scores,
                current_turn,
                mines_left,
                elapsed_secs,
            } => {
                if let Some(view) = self.view.as_mut().filter(|v| v.game_id == game_id) {
                    view.state = state;
                    for update in &cell_updates {
                        view.set_cell((update.x, update.y), update.cell);
                    }
                    for player in &mut view.players {
                        if let Some(&score) = scores.get(&player.id) {
                            player.score = score;
                        }
                    }
                    view.current_turn = current_turn;
                    view.mines_left = mines_left;
                    view.elapsed_secs = elapsed_secs;
                }
                Event::Updated
            }
            ServerMessage::Error { message } => Event::Rejected(message),
            ServerMessage::BotSummoned { name } => Event::BotSummoned(name),
            ServerMessage::GameTerminated { reason, .. } => {
                self.view = None;
                Event::Terminated(reason)
            }
        }
    }
}

/// One authenticated connection to the server, with the mirrored view of
/// whatever game it is currently in.
pub struct GameClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mirror: ViewMirror,
}

impl GameClient {
    /// Connects and identifies as `name`. The server mints an anonymous
    /// identity from the name hint when no token is given.
    pub async fn connect(
        server_url: &str,
        name: &str,
        token: Option<&str>,
    ) -> Result<Self, ClientError> {
        let mut url = format!(
            "{}/?name={}",
            server_url.trim_end_matches('/'),
            percent_encode(name)
        );
        if let Some(token) = token {
            url.push_str("&token=");
            url.push_str(&percent_encode(token));
        }
        let (ws, _) = connect_async(url.as_str()).await?;
        Ok(Self {
            ws,
            mirror: ViewMirror::default(),
        })
    }

    pub fn view(&self) -> Option<&GameView> {
        self.mirror.view()
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(msg)?;
        self.ws.send(WsMessage::text(text)).await?;
        Ok(())
    }

    /// Waits for the next protocol frame, folds it into the mirror, and says
    /// what happened. Frames that do not decode are dropped, mirroring the
    /// server's own tolerance.
    pub async fn next_event(&mut self) -> Result<Event, ClientError> {
        loop {
            match self.ws.next().await {
                None | Some(Ok(WsMessage::Close(_))) => return Err(ClientError::Closed),
                Some(Err(err)) => return Err(err.into()),
                Some(Ok(WsMessage::Text(text))) => {
                    let Ok(msg) = serde_json::from_str::<ServerMessage>(text.as_str()) else {
                        log::debug!("dropping undecodable frame: {text}");
                        continue;
                    };
                    return Ok(self.mirror.absorb(msg));
                }
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Converts the row-major wire grid into the column-major array the solver
/// reads.
pub fn board_from_view(view: &GameView) -> Array2<Cell> {
    let mut board = Array2::default(nd((view.width, view.height)));
    for (y, row) in view.grid.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            board[nd((x as Coord, y as Coord))] = cell;
        }
    }
    board
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
