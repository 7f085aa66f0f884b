use serde::{Deserialize, Serialize};

use crate::money::Chips;

/// A client action on the acting player's turn.
///
/// `Raise.amount` is the total the player raises *to* on this street,
/// not the increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Raise { amount: Chips },
    AllIn,
}

impl PlayerAction {
    #[must_use]
    pub fn kind(self) -> ActionKind {
        match self {
            PlayerAction::Fold => ActionKind::Fold,
            PlayerAction::Check => ActionKind::Check,
            PlayerAction::Call => ActionKind::Call,
            PlayerAction::Raise { .. } => ActionKind::Raise,
            PlayerAction::AllIn => ActionKind::AllIn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Raise => "raise",
            ActionKind::AllIn => "all_in",
        }
    }
}

/// One currently-legal action for the acting seat, advertised to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAction {
    pub kind: ActionKind,
    pub min_amount: Option<Chips>,
    pub max_amount: Option<Chips>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_payload_carries_total_to_amount() {
        let json = serde_json::json!({ "action": "raise", "amount": 60 });
        let action: PlayerAction = serde_json::from_value(json).expect("deserialize");
        assert_eq!(action, PlayerAction::Raise { amount: Chips(60) });
        assert_eq!(action.kind().as_str(), "raise");
    }
}
