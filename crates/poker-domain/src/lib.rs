pub mod action;
pub mod card;
pub mod errors;
pub mod events;
pub mod game;
pub mod ids;
pub mod money;
pub mod snapshot;

pub use action::{ActionKind, LegalAction, PlayerAction};
pub use card::{Card, CardParseError, Rank, Suit};
pub use errors::ActionError;
pub use events::{GameEvent, GameWinner, StackEntry, WinnerEntry};
pub use game::{SeatId, Street};
pub use ids::{HandId, RoomId, UserId};
pub use money::{Chips, MoneyError};
pub use snapshot::{EngineSnapshot, PlayerView};
