use serde::{Deserialize, Serialize};

use crate::*;

/// One participant as shown to viewers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub score: u32,
}

/// A single changed cell, broadcast after a move.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub x: Coord,
    pub y: Coord,
    pub cell: Cell,
}

impl CellUpdate {
    pub const fn new((x, y): Coord2, cell: Cell) -> Self {
        Self { x, y, cell }
    }
}

/// Viewer projection of a game: revealed numbers, flag markers, everything
/// else opaque. The mine layout never appears here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameView {
    pub game_id: String,
    pub mode: GameMode,
    pub state: GameState,
    pub width: Coord,
    pub height: Coord,
    pub total_mines: CellCount,
    pub mines_left: CellCount,
    pub elapsed_secs: u64,
    pub players: Vec<PlayerView>,
    pub current_turn: Option<String>,
    /// Row-major: `grid[y][x]`.
    pub grid: Vec<Vec<Cell>>,
}

impl GameView {
    pub fn cell(&self, coords: Coord2) -> Option<Cell> {
        self.grid
            .get(coords.1 as usize)
            .and_then(|row| row.get(coords.0 as usize))
            .copied()
    }

    pub fn set_cell(&mut self, coords: Coord2, cell: Cell) {
        if let Some(slot) = self
            .grid
            .get_mut(coords.1 as usize)
            .and_then(|row| row.get_mut(coords.0 as usize))
        {
            *slot = cell;
        }
    }
}
