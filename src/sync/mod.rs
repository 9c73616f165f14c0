pub mod engine;
pub mod scheduler;

pub use engine::{SyncEngine, SyncEngineOptions, SyncOutcome, SyncState};
pub use scheduler::{Scheduler, SchedulerOptions, SchedulerStatus};
