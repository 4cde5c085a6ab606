use core::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use error::*;
pub use game::*;
pub use generator::*;
pub use solver::*;
pub use types::*;
pub use view::*;

mod cell;
mod error;
mod game;
mod generator;
mod solver;
mod types;
mod view;

/// Named board presets exposed on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const fn config(self) -> GameConfig {
        match self {
            Self::Easy => GameConfig::new_unchecked((9, 9), 10),
            Self::Medium => GameConfig::new_unchecked((16, 16), 40),
            Self::Hard => GameConfig::new_unchecked((30, 16), 99),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(GameError::UnknownName),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    /// Clamps dimensions and mine count so that `mines < width * height` holds.
    pub fn new((width, height): Coord2, mines: CellCount) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mines = mines.clamp(1, cell_count(width, height).saturating_sub(1).max(1));
        Self::new_unchecked((width, height), mines)
    }

    pub const fn total_cells(&self) -> CellCount {
        cell_count(self.size.0, self.size.1)
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        if coords.0 < self.size.0 && coords.1 < self.size.1 {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }
}

/// Ground-truth mine placement. Adjacency counts are computed once, right
/// after placement, and never change for the lifetime of the layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Minefield {
    mines: Array2<bool>,
    adjacent: Array2<u8>,
    mine_count: CellCount,
}

impl Minefield {
    pub fn from_mask(mines: Array2<bool>) -> Self {
        let dim = mines.dim();
        let size = (dim.0 as Coord, dim.1 as Coord);

        let mut adjacent = Array2::zeros(dim);
        let mut mine_count: CellCount = 0;
        for x in 0..size.0 {
            for y in 0..size.1 {
                let coords = (x, y);
                if mines[nd(coords)] {
                    mine_count += 1;
                    continue;
                }
                adjacent[nd(coords)] = neighbors(coords, size)
                    .filter(|&pos| mines[nd(pos)])
                    .count() as u8;
            }
        }

        Self {
            mines,
            adjacent,
            mine_count,
        }
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mines: Array2<bool> = Array2::default(nd(size));
        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::InvalidCoords);
            }
            mines[nd(coords)] = true;
        }
        Ok(Self::from_mask(mines))
    }

    pub fn size(&self) -> Coord2 {
        let dim = self.mines.dim();
        (dim.0 as Coord, dim.1 as Coord)
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn safe_cell_count(&self) -> CellCount {
        let (width, height) = self.size();
        cell_count(width, height) - self.mine_count
    }

    pub fn is_mine(&self, coords: Coord2) -> bool {
        self.mines[nd(coords)]
    }

    pub fn adjacent_count(&self, coords: Coord2) -> u8 {
        self.adjacent[nd(coords)]
    }

    pub fn iter_mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        let (width, height) = self.size();
        (0..width)
            .flat_map(move |x| (0..height).map(move |y| (x, y)))
            .filter(|&coords| self.is_mine(coords))
    }
}
