use serde::{Deserialize, Serialize};

use crate::action::ActionKind;
use crate::card::Card;
use crate::game::{SeatId, Street};
use crate::ids::UserId;
use crate::money::Chips;

/// Events the engine emits to clients. All variants are room-wide
/// broadcasts except `HoleCardsDealt` and per-user `GameError`s, which
/// the room actor routes through the private fan-out path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    HandStarted {
        hand_number: u64,
        dealer_pos: SeatId,
        sb_pos: SeatId,
        bb_pos: SeatId,
        pot: Chips,
    },
    PotUpdated {
        pot: Chips,
    },
    ActionPerformed {
        user_id: UserId,
        action: ActionKind,
        amount: Chips,
        pot: Chips,
        current_bet: Chips,
    },
    StreetAdvanced {
        street: Street,
        board: Vec<Card>,
        pot: Chips,
    },
    TurnStarted {
        user_id: UserId,
        position: SeatId,
        time_remaining: u32,
        current_bet: Chips,
        min_raise: Chips,
        call_amount: Chips,
    },
    TurnTick {
        time_remaining: u32,
    },
    WinnerDetermined {
        winners: Vec<WinnerEntry>,
        pot: Chips,
        board: Vec<Card>,
    },
    StacksUpdated {
        players: Vec<StackEntry>,
    },
    PositionsUpdated {
        dealer_pos: SeatId,
        sb_pos: SeatId,
        bb_pos: SeatId,
    },
    GameEnded {
        winner: Option<GameWinner>,
    },
    GameError {
        message: String,
        kind: String,
    },
    HoleCardsDealt {
        hole_cards: [Card; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerEntry {
    pub user_id: UserId,
    pub amount_won: Chips,
    pub hand_rank_name: String,
    /// Revealed at showdown only; absent on fold-out wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<[Card; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEntry {
    pub user_id: UserId,
    pub stack: Chips,
    pub eliminated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameWinner {
    pub user_id: UserId,
    pub stack: Chips,
}
