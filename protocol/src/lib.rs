//! Wire protocol for the multiplayer minesweeper server: JSON objects tagged
//! by a `type` field, exchanged over a persistent WebSocket connection.
//!
//! Both directions are closed tagged unions so dispatchers can match
//! exhaustively; anything that does not decode is dropped by the receiver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use jirai_core::{CellCount, CellUpdate, Coord, Difficulty, GameMode, GameState, GameView};

/// An optional reveal executed atomically with game creation, before the
/// first broadcast.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstMove {
    pub x: Coord,
    pub y: Coord,
}

/// Messages a client may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewGame {
        difficulty: Difficulty,
        mode: GameMode,
        #[serde(default)]
        invite_ids: Vec<String>,
        #[serde(default)]
        first_move: Option<FirstMove>,
    },
    JoinGame {
        game_id: String,
    },
    Reveal {
        x: Coord,
        y: Coord,
    },
    Flag {
        x: Coord,
        y: Coord,
    },
    SummonBot {
        game_id: String,
    },
    KickPlayer {
        target_id: String,
    },
    RestartGame {
        game_id: String,
        #[serde(default)]
        difficulty: Option<Difficulty>,
    },
    LeaveGame {
        game_id: String,
    },
}

/// Messages the server may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full snapshot: game creation, joins, restarts, and reconnects.
    GameStart { view: GameView },
    /// Incremental delta after an accepted move.
    GameUpdate {
        game_id: String,
        state: GameState,
        cell_updates: Vec<CellUpdate>,
        scores: HashMap<String, u32>,
        current_turn: Option<String>,
        mines_left: CellCount,
        elapsed_secs: u64,
    },
    /// Domain-rule rejection, sent only to the offending connection.
    Error { message: String },
    BotSummoned { name: String },
    GameTerminated { game_id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use jirai_core::Cell;

    #[test]
    fn inbound_messages_decode_from_tagged_json() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"new_game","difficulty":"easy","mode":"flags","invite_ids":["p2"],"first_move":{"x":3,"y":4}}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ClientMessage::NewGame {
                difficulty: Difficulty::Easy,
                mode: GameMode::Flags,
                invite_ids: vec!["p2".into()],
                first_move: Some(FirstMove { x: 3, y: 4 }),
            }
        );
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"new_game","difficulty":"hard","mode":"classic"}"#,
        )
        .unwrap();

        assert_eq!(
            msg,
            ClientMessage::NewGame {
                difficulty: Difficulty::Hard,
                mode: GameMode::Classic,
                invite_ids: Vec::new(),
                first_move: None,
            }
        );
    }

    #[test]
    fn unknown_type_tags_fail_to_decode() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"teleport","x":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn outbound_update_uses_snake_case_tags() {
        let msg = ServerMessage::GameUpdate {
            game_id: "abc".into(),
            state: GameState::Playing,
            cell_updates: vec![CellUpdate::new((1, 2), Cell::Revealed(3))],
            scores: HashMap::from([("p1".to_string(), 2)]),
            current_turn: Some("p1".into()),
            mines_left: 9,
            elapsed_secs: 17,
        };

        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "game_update");
        assert_eq!(json["state"], "playing");
        assert_eq!(json["cell_updates"][0]["cell"]["revealed"], 3);
        assert_eq!(json["scores"]["p1"], 2);
    }

    #[test]
    fn error_and_termination_round_trip() {
        for msg in [
            ServerMessage::Error {
                message: "not your turn".into(),
            },
            ServerMessage::GameTerminated {
                game_id: "abc".into(),
                reason: "returned to lobby".into(),
            },
        ] {
            let json = serde_json::to_string(&msg).unwrap();
            let back: ServerMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(back, msg);
        }
    }
}
