use core::str::FromStr;
use std::collections::BTreeSet;

use ndarray::Array2;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::*;

/// Certain conclusions derivable from the visible board alone: every cell in
/// `safe` is provably clear, every cell in `mines` provably a mine, assuming
/// placed flags are correct. Accumulated over the whole board, not one clue.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Analysis {
    pub safe: BTreeSet<Coord2>,
    pub mines: BTreeSet<Coord2>,
}

impl Analysis {
    pub fn is_empty(&self) -> bool {
        self.safe.is_empty() && self.mines.is_empty()
    }
}

/// Runs the deterministic constraint pass over a visibility grid.
///
/// For each revealed number, flagged and found-mine neighbors count as known
/// mines. A clue fully satisfied by known mines proves its other hidden
/// neighbors safe; a clue whose hidden neighbors are all needed proves them
/// mines.
pub fn analyze(board: &Array2<Cell>) -> Analysis {
    let dim = board.dim();
    let size = (dim.0 as Coord, dim.1 as Coord);

    let mut analysis = Analysis::default();
    for x in 0..size.0 {
        for y in 0..size.1 {
            let Cell::Revealed(number) = board[nd((x, y))] else {
                continue;
            };

            let mut hidden = Vec::new();
            let mut known_mines: u8 = 0;
            for pos in neighbors((x, y), size) {
                let cell = board[nd(pos)];
                if cell.is_hidden() {
                    hidden.push(pos);
                } else if cell.counts_as_flag() {
                    known_mines += 1;
                }
            }
            if hidden.is_empty() {
                continue;
            }

            if known_mines == number {
                analysis.safe.extend(hidden);
            } else if known_mines + hidden.len() as u8 == number {
                analysis.mines.extend(hidden);
            }
        }
    }
    analysis
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BotAction {
    Reveal,
    Flag,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BotMove {
    pub coords: Coord2,
    pub action: BotAction,
}

impl BotMove {
    const fn reveal(coords: Coord2) -> Self {
        Self {
            coords,
            action: BotAction::Reveal,
        }
    }

    const fn flag(coords: Coord2) -> Self {
        Self {
            coords,
            action: BotAction::Flag,
        }
    }
}

/// Move policies sharing the one constraint pass.
///
/// The fallback is a uniform pick among hidden cells, an explicit
/// approximation rather than a minimal-risk estimate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Safe reveals first, then flag proven mines, then guess.
    Classic,
    /// For flags mode: reveal proven mines first (a point and a kept turn),
    /// then open safe cells for information, then guess.
    Hunter,
}

impl Strategy {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Hunter => "hunter",
        }
    }

    pub fn choose(self, board: &Array2<Cell>, rng: &mut impl Rng) -> Option<BotMove> {
        let analysis = analyze(board);
        let first = |set: &BTreeSet<Coord2>| set.iter().next().copied();

        let certain = match self {
            Self::Classic => first(&analysis.safe)
                .map(BotMove::reveal)
                .or_else(|| first(&analysis.mines).map(BotMove::flag)),
            Self::Hunter => first(&analysis.mines)
                .map(BotMove::reveal)
                .or_else(|| first(&analysis.safe).map(BotMove::reveal)),
        };

        certain.or_else(|| random_hidden(board, rng).map(BotMove::reveal))
    }
}

impl FromStr for Strategy {
    type Err = GameError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "classic" => Ok(Self::Classic),
            "hunter" => Ok(Self::Hunter),
            _ => Err(GameError::UnknownName),
        }
    }
}

/// Uniform pick among all hidden cells; the explicit guess policy.
pub fn random_hidden(board: &Array2<Cell>, rng: &mut impl Rng) -> Option<Coord2> {
    let dim = board.dim();
    let size = (dim.0 as Coord, dim.1 as Coord);
    let hidden: Vec<Coord2> = (0..size.0)
        .flat_map(|x| (0..size.1).map(move |y| (x, y)))
        .filter(|&coords| board[nd(coords)].is_hidden())
        .collect();
    hidden.choose(rng).copied()
}
