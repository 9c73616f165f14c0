//! Sync core: event bus, object-store contract, repository contract,
//! conflict resolution, offline queue, sync engine, scheduler, config.

pub mod conflict;
pub mod config;
pub mod error;
pub mod event;
pub mod queue;
pub mod repository;
pub mod store;
pub mod sync;
pub mod types;

pub use conflict::{Conflict, ConflictResolver, ResolutionStrategy, ResolveOutcome};
pub use config::{AiConfig, AiProvider, AnalysisConfig, Config, ConfigError, ExportConfig, ObjectStoreConfig, SyncConfig};
pub use error::{CoreError, Result};
pub use event::{Event, EventBus, EventKind, Subscriber};
pub use queue::{OperationKind, QueueError, QueueItem, QueueState, QueueStats, SyncQueue};
pub use repository::{ContentItemFilter, InMemoryRepository, Repository};
pub use store::{InMemoryObjectStore, ObjectStore, ObjectStoreError, StoreResult};
pub use sync::{Scheduler, SchedulerOptions, SchedulerStatus, SyncEngine, SyncEngineOptions, SyncOutcome, SyncState};
pub use types::{
    AnalysisMethod, AnalysisResult, ChangeLogEntry, ChangeOperation, ConflictLogEntry, ContentItem,
    Language, MediaType, SyncErrorEntry,
};
