use serde::{Deserialize, Serialize};

use crate::action::LegalAction;
use crate::card::Card;
use crate::game::{SeatId, Street};
use crate::ids::UserId;
use crate::money::Chips;

/// Full public room view sent to a (re)connecting client. Hole cards
/// are filtered to the requesting user before this leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub hand_number: u64,
    pub in_hand: bool,
    pub street: Option<Street>,
    pub board: Vec<Card>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub dealer_pos: Option<SeatId>,
    pub sb_pos: Option<SeatId>,
    pub bb_pos: Option<SeatId>,
    pub to_act_pos: Option<SeatId>,
    pub players: Vec<PlayerView>,
    /// Legal actions for the viewer, when it is their turn.
    pub legal_actions: Vec<LegalAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub user_id: UserId,
    pub username: String,
    pub position: SeatId,
    pub stack: Chips,
    pub committed_this_street: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub eliminated: bool,
    /// Present only when the viewer owns this seat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<[Card; 2]>,
}
