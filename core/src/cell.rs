use serde::{Deserialize, Serialize};

/// Shared visibility state of one board cell, as every participant sees it.
///
/// `Mine` is a disclosed mine: the losing click and the end-of-game reveal in
/// classic mode, or a found-and-scored mine in flags mode. A `Mine` cell counts
/// toward the flag total.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Hidden,
    Flagged,
    Revealed(u8),
    Mine,
}

impl Cell {
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden)
    }

    /// Flagged either explicitly or by having been found as a mine.
    pub const fn counts_as_flag(self) -> bool {
        matches!(self, Self::Flagged | Self::Mine)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::Hidden
    }
}
