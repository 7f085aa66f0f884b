pub mod deck;
pub mod engine;
pub mod eval;
pub mod pot;
pub mod state;

pub use deck::{Deck, DeckError};
pub use engine::{
    EngineError, EngineOutput, EnginePhase, Followup, HandEngine, HandWrite, Outbound,
    SeatedPlayer, TimerCmd,
};
pub use eval::{HandCategory, HandRank, evaluate, find_winners};
pub use pot::{SidePot, partition_pots, split_pot};
pub use state::{HandState, PlayerState, TableConfig};
