use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("invalid coordinates")]
    InvalidCoords,
    #[error("not your turn")]
    NotYourTurn,
    #[error("waiting for opponent")]
    WaitingForOpponent,
    #[error("flag limit reached")]
    FlagLimitReached,
    #[error("unrecognized name")]
    UnknownName,
}

pub type Result<T> = core::result::Result<T, GameError>;
