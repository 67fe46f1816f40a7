//! Virtual pet companion core: a mood/energy state machine with periodic
//! decay, engagement statistics, a fixed achievement catalog and
//! key-value persistence.

pub mod achievements;
pub mod companion;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod sim;
pub mod stats;
pub mod storage;

pub use companion::{Companion, Notification, Summary};
pub use error::{Result, StoreError};
pub use model::{Activity, ActivityState, Interaction, PetState};
pub use stats::StatisticsRecord;
pub use storage::{FileStore, KeyValueStore, MemoryStore};
