use serde::{Deserialize, Serialize};

/// Stable seat position at the table. Positions need not be contiguous;
/// their sorted order defines clockwise order.
pub type SeatId = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Complete,
}

impl Street {
    /// The next betting street, if any. Showdown and Complete are terminal.
    #[must_use]
    pub fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River | Street::Showdown | Street::Complete => None,
        }
    }

    /// Number of community cards dealt when this street opens.
    #[must_use]
    pub fn cards_dealt(self) -> usize {
        match self {
            Street::Flop => 3,
            Street::Turn | Street::River => 1,
            Street::Preflop | Street::Showdown | Street::Complete => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Street::Preflop => "preflop",
            Street::Flop => "flop",
            Street::Turn => "turn",
            Street::River => "river",
            Street::Showdown => "showdown",
            Street::Complete => "complete",
        }
    }
}
