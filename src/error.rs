use thiserror::Error;

/// Closed error taxonomy for the sync/analysis core (spec §7).
///
/// Every fallible public operation in this workspace returns through this
/// type, either directly or via a component-specific error that converts
/// into it with `#[from]`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Object store rejected credentials; non-retryable.
    #[error("sync auth failed: {0}")]
    SyncAuthFailed(String),

    /// Object store reported quota/rate-limit exhaustion; retryable at the
    /// next scheduler tick.
    #[error("sync quota exceeded: {0}")]
    SyncQuotaExceeded(String),

    /// Generic retryable storage/network failure.
    #[error("sync failed: {0}")]
    SyncFailed(String),

    /// `ConflictResolver` was asked to resolve a pair where one side is
    /// missing.
    #[error("invalid conflict: {0}")]
    InvalidConflict(String),

    /// `ConflictResolver` was asked to resolve a pair whose ids don't match.
    #[error("item id mismatch: local={local}, remote={remote}")]
    ItemIdMismatch { local: String, remote: String },

    /// Field-level CRDT merge is an explicit unsupported operation.
    #[error("merge is not supported")]
    MergeNotSupported,

    /// `SyncQueue::enqueue` called while at capacity.
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// `SyncEngine::sync` called while a cycle is already running.
    #[error("sync already in progress")]
    AlreadyInProgress,

    /// Repository-level failure; a per-item warning unless it prevents
    /// listing items at all.
    #[error("database error: {0}")]
    DatabaseError(String),

    /// Failed to deserialise a remote blob; recorded as a per-item warning.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A sync cycle was cancelled mid-phase.
    #[error("sync cancelled")]
    Cancelled,

    /// `Scheduler::stop` called a second time.
    #[error("scheduler already stopped")]
    SchedulerAlreadyStopped,

    /// Object-store error bubbled up unmapped (see `pkb-s3-store`'s own
    /// error type for the richer, crate-local variant this is flattened
    /// from at the `pkb-core` boundary).
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Configuration could not be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Content-analysis pipeline failed in a way no fallback tier recovered
    /// from (e.g. empty input to `analyze_content`).
    #[error("analysis error: {0}")]
    Analysis(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
