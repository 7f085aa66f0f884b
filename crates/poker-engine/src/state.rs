use poker_domain::{Card, Chips, HandId, SeatId, Street, UserId};

use crate::deck::Deck;

/// Fixed table parameters for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    pub starting_stack: Chips,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub turn_seconds: u32,
    pub max_seats: usize,
    pub min_players: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            starting_stack: Chips(1500),
            small_blind: Chips(10),
            big_blind: Chips(20),
            turn_seconds: 30,
            max_seats: 10,
            min_players: 2,
        }
    }
}

/// Per-seat state. Created when the player is seated; the per-hand
/// fields are reset at the head of each hand.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub user_id: UserId,
    pub username: String,
    pub position: SeatId,
    pub stack: Chips,
    pub committed_this_street: Chips,
    pub committed_this_hand: Chips,
    pub hole_cards: Option<[Card; 2]>,
    pub folded: bool,
    pub all_in: bool,
    pub eliminated: bool,
    pub has_acted_this_street: bool,
}

impl PlayerState {
    #[must_use]
    pub fn new(user_id: UserId, username: String, position: SeatId, stack: Chips) -> Self {
        Self {
            user_id,
            username,
            position,
            stack,
            committed_this_street: Chips::ZERO,
            committed_this_hand: Chips::ZERO,
            hole_cards: None,
            folded: false,
            all_in: false,
            eliminated: false,
            has_acted_this_street: false,
        }
    }

    pub fn reset_for_hand(&mut self) {
        self.committed_this_street = Chips::ZERO;
        self.committed_this_hand = Chips::ZERO;
        self.hole_cards = None;
        self.folded = false;
        self.all_in = false;
        self.has_acted_this_street = false;
    }

    /// Seated, not folded, not eliminated.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.folded && !self.eliminated
    }

    /// Live and still able to put chips in on their turn.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.is_live() && !self.all_in
    }
}

/// Mutable state of the hand in flight. Positions live on the engine
/// because they persist across the inter-hand gap.
#[derive(Debug)]
pub struct HandState {
    pub hand_id: HandId,
    pub street: Street,
    pub board: Vec<Card>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub last_aggressor_pos: Option<SeatId>,
    pub to_act_pos: Option<SeatId>,
    pub deck: Deck,
}
