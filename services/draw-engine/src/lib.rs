pub mod contract;
pub mod engine;
pub mod error;
pub mod execute;
pub mod msg;
pub mod pool;
pub mod query;
pub mod report;
pub mod sources;
pub mod state;

pub use crate::engine::{DrawEngine, WinnerNotifier};
pub use crate::error::ContractError;
pub use crate::sources::{
    Clock, FixedSeedSource, ManualClock, OsSeedSource, SeedSource, SystemClock,
};
