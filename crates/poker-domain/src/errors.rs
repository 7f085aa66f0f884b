use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client-recoverable action rejections. None of these mutate game
/// state; each is delivered privately to the submitting user as a
/// `GameError` with the stable `kind` identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionError {
    #[error("action submitted by a seat that is not to act")]
    NotYourTurn,
    #[error("action is not legal right now: {0}")]
    IllegalAction(String),
    #[error("raise or call exceeds remaining stack")]
    InsufficientChips,
    #[error("no active hand, or player is folded, all-in, or eliminated")]
    NotInHand,
    #[error("malformed action payload: {0}")]
    BadInput(String),
}

impl ActionError {
    /// Stable identifier surfaced in `GameError.kind`.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::NotYourTurn => "NotYourTurn",
            ActionError::IllegalAction(_) => "IllegalAction",
            ActionError::InsufficientChips => "InsufficientChips",
            ActionError::NotInHand => "NotInHand",
            ActionError::BadInput(_) => "BadInput",
        }
    }
}
