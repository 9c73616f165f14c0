//! Two-phase (upload/download) reconciliation engine (spec §4.6).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::conflict::ConflictResolver;
use crate::error::CoreError;
use crate::event::{Event, EventBus, EventKind, Subscriber};
use crate::repository::{ContentItemFilter, Repository};
use crate::store::ObjectStore;
use crate::types::{ChangeLogEntry, ChangeOperation, ConflictLogEntry, ContentItem, SyncErrorEntry};

/// Repository pages this many items per `list_content_items` call during the
/// upload phase (spec §9's resolved open question: paginate rather than
/// truncate at 1000).
const UPLOAD_PAGE_SIZE: usize = 1000;

/// Every `start_periodic` invocation, and `Scheduler::sync_now`, wraps one
/// cycle in this timeout.
pub const SYNC_CYCLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Failed,
}

/// Result of one `SyncEngine::sync` invocation. Always produced — this type
/// carries both success and failure information (mirroring the teacher's
/// `SyncResult` accumulator, which is likewise returned directly rather than
/// wrapped in `Result`) so a cancelled or partially-failed cycle still
/// reports how far it got.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub sync_id: String,
    /// `true` if `sync` was called while a cycle was already running; no
    /// new cycle was started and every other field is zero/default.
    pub already_in_progress: bool,
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts: usize,
    pub cancelled: bool,
    pub error: Option<String>,
}

pub struct SyncEngineOptions {
    pub store: Arc<dyn ObjectStore>,
    pub repository: Arc<dyn Repository>,
    pub events: Arc<EventBus>,
    pub resolver: ConflictResolver,
    pub max_error_history: usize,
}

/// Orchestrates upload -> download -> conflict-logging cycles (spec §4.6).
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    repository: Arc<dyn Repository>,
    events: Arc<EventBus>,
    resolver: ConflictResolver,
    max_error_history: usize,
    state: Mutex<SyncState>,
    last_sync_at: Mutex<Option<i64>>,
    pending_changes: Mutex<usize>,
    last_error: Mutex<Option<String>>,
    error_history: Mutex<VecDeque<SyncErrorEntry>>,
    /// Last version of each item successfully `put` to the store. An upload
    /// is skipped when the item's current version already matches — this is
    /// what makes a second, mutation-free `sync()` a no-op (spec §8).
    synced_versions: Mutex<HashMap<String, u64>>,
}

impl SyncEngine {
    pub fn new(options: SyncEngineOptions) -> Self {
        Self {
            store: options.store,
            repository: options.repository,
            events: options.events,
            resolver: options.resolver,
            max_error_history: options.max_error_history,
            state: Mutex::new(SyncState::Idle),
            last_sync_at: Mutex::new(None),
            pending_changes: Mutex::new(0),
            last_error: Mutex::new(None),
            error_history: Mutex::new(VecDeque::new()),
            synced_versions: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self) -> SyncState {
        *self.state.lock()
    }

    pub fn last_sync(&self) -> Option<i64> {
        *self.last_sync_at.lock()
    }

    pub fn pending_changes(&self) -> usize {
        *self.pending_changes.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn subscribe(&self, handler: Option<Subscriber>) {
        self.events.subscribe(handler);
    }

    /// The most recent (up to `max_error_history`) per-item warnings,
    /// oldest first.
    pub fn get_error_history(&self) -> Vec<SyncErrorEntry> {
        self.error_history.lock().iter().cloned().collect()
    }

    pub fn clear_error_history(&self) {
        self.error_history.lock().clear();
    }

    fn record_error(&self, item_id: Option<String>, operation: &str, error: String) {
        let mut history = self.error_history.lock();
        if history.len() >= self.max_error_history {
            history.pop_front();
        }
        history.push_back(SyncErrorEntry {
            timestamp: Utc::now().timestamp(),
            item_id,
            operation: operation.to_string(),
            error,
        });
    }

    fn emit_warning(&self, sync_id: &str, item_id: Option<String>, message: String) {
        let mut event = Event::new(EventKind::SyncWarning, message.clone())
            .with_error(message)
            .with_data("sync_id", sync_id.to_string());
        if let Some(id) = item_id {
            event = event.with_item_id(id);
        }
        self.events.emit(event);
    }

    /// Runs one full sync cycle: refuses to start if a cycle is already in
    /// flight, otherwise runs the upload phase followed by the download
    /// phase under a shared `sync_id`.
    pub async fn sync(&self, token: CancellationToken) -> SyncOutcome {
        {
            let mut state = self.state.lock();
            if *state == SyncState::Syncing {
                return SyncOutcome {
                    already_in_progress: true,
                    ..Default::default()
                };
            }
            *state = SyncState::Syncing;
        }

        let sync_id = Uuid::new_v4().to_string();
        self.events.emit(
            Event::new(EventKind::SyncStarted, "sync cycle started")
                .with_data("sync_id", sync_id.clone()),
        );
        tracing::info!(sync_id = %sync_id, "sync cycle started");

        let mut outcome = SyncOutcome {
            sync_id: sync_id.clone(),
            ..Default::default()
        };

        if let Err(e) = self.upload_phase(&sync_id, &token, &mut outcome).await {
            self.finish_failed(&sync_id, &mut outcome, e);
            return outcome;
        }

        if let Err(e) = self.download_phase(&sync_id, &token, &mut outcome).await {
            self.finish_failed(&sync_id, &mut outcome, e);
            return outcome;
        }

        *self.state.lock() = SyncState::Idle;
        *self.last_sync_at.lock() = Some(Utc::now().timestamp());
        *self.pending_changes.lock() = 0;
        *self.last_error.lock() = None;
        tracing::info!(
            sync_id = %sync_id,
            uploaded = outcome.uploaded,
            downloaded = outcome.downloaded,
            conflicts = outcome.conflicts,
            "sync cycle completed"
        );
        self.events.emit(
            Event::new(EventKind::SyncCompleted, "sync cycle completed")
                .with_data("sync_id", sync_id.clone())
                .with_data("uploaded", outcome.uploaded as i64)
                .with_data("downloaded", outcome.downloaded as i64)
                .with_data("conflicts", outcome.conflicts as i64),
        );
        outcome
    }

    fn finish_failed(&self, sync_id: &str, outcome: &mut SyncOutcome, error: CoreError) {
        let cancelled = matches!(error, CoreError::Cancelled);
        let message = error.to_string();
        outcome.cancelled = cancelled;
        outcome.error = Some(message.clone());
        *self.state.lock() = SyncState::Failed;
        *self.last_error.lock() = Some(message.clone());
        tracing::error!(sync_id = %sync_id, error = %message, "sync cycle failed");
        self.events.emit(
            Event::new(EventKind::SyncFailed, "sync cycle failed")
                .with_error(message)
                .with_data("sync_id", sync_id.to_string()),
        );
    }

    async fn upload_phase(
        &self,
        sync_id: &str,
        token: &CancellationToken,
        outcome: &mut SyncOutcome,
    ) -> Result<(), CoreError> {
        let mut offset = 0usize;
        let mut needing_upload = 0usize;

        loop {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let page = self.repository.list_content_items(
                UPLOAD_PAGE_SIZE,
                offset,
                ContentItemFilter::non_deleted(),
            )?;
            if page.is_empty() {
                break;
            }

            for item in &page {
                if token.is_cancelled() {
                    return Err(CoreError::Cancelled);
                }
                let already_synced =
                    self.synced_versions.lock().get(&item.id).copied() == Some(item.version);
                if already_synced {
                    continue;
                }
                needing_upload += 1;
                self.upload_one(sync_id, item, outcome).await;
            }

            if page.len() < UPLOAD_PAGE_SIZE {
                break;
            }
            offset += UPLOAD_PAGE_SIZE;
        }

        *self.pending_changes.lock() = needing_upload.saturating_sub(outcome.uploaded);
        self.events.emit(
            Event::new(EventKind::SyncProgress, "upload phase complete")
                .with_data("sync_id", sync_id.to_string())
                .with_data("phase", "upload")
                .with_data("uploaded", outcome.uploaded as i64),
        );
        Ok(())
    }

    async fn upload_one(&self, sync_id: &str, item: &ContentItem, outcome: &mut SyncOutcome) {
        let bytes = match serde_json::to_vec(item) {
            Ok(b) => b,
            Err(e) => {
                self.record_error(Some(item.id.clone()), "upload", e.to_string());
                self.emit_warning(sync_id, Some(item.id.clone()), e.to_string());
                return;
            }
        };

        match self.store.put(&item.object_key(), bytes).await {
            Ok(()) => {
                outcome.uploaded += 1;
                self.synced_versions
                    .lock()
                    .insert(item.id.clone(), item.version);
                self.events.emit(
                    Event::new(EventKind::SyncUploadItem, "uploaded item")
                        .with_item_id(item.id.clone())
                        .with_data("sync_id", sync_id.to_string()),
                );
                if let Err(e) = self.repository.append_change_log(ChangeLogEntry {
                    item_id: item.id.clone(),
                    operation: ChangeOperation::Update,
                    version: item.version,
                    timestamp: Utc::now().timestamp(),
                }) {
                    self.record_error(Some(item.id.clone()), "upload", e.to_string());
                }
            }
            Err(e) => {
                self.record_error(Some(item.id.clone()), "upload", e.to_string());
                self.emit_warning(sync_id, Some(item.id.clone()), e.to_string());
            }
        }
    }

    async fn download_phase(
        &self,
        sync_id: &str,
        token: &CancellationToken,
        outcome: &mut SyncOutcome,
    ) -> Result<(), CoreError> {
        let keys = self.store.list("items/").await?;

        for key in keys {
            if token.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            let bytes = match self.store.get(&key).await {
                Ok(b) => b,
                Err(e) => {
                    self.record_error(None, "download", e.to_string());
                    self.emit_warning(sync_id, None, e.to_string());
                    continue;
                }
            };

            let remote: ContentItem = match serde_json::from_slice(&bytes) {
                Ok(item) => item,
                Err(e) => {
                    let msg = format!("parse error for {key}: {e}");
                    self.record_error(None, "download", msg.clone());
                    self.emit_warning(sync_id, None, msg);
                    continue;
                }
            };

            let local = self.repository.get_content_item(&remote.id)?;
            match local {
                None => {
                    self.repository.create_content_item(remote.clone())?;
                    outcome.downloaded += 1;
                    self.synced_versions
                        .lock()
                        .insert(remote.id.clone(), remote.version);
                    self.events.emit(
                        Event::new(EventKind::SyncDownloadItem, "downloaded new item")
                            .with_item_id(remote.id.clone())
                            .with_data("sync_id", sync_id.to_string()),
                    );
                }
                Some(local) if local.version < remote.version => {
                    self.repository.update_content_item(remote.clone())?;
                    outcome.downloaded += 1;
                    self.synced_versions
                        .lock()
                        .insert(remote.id.clone(), remote.version);
                    self.events.emit(
                        Event::new(EventKind::SyncDownloadItem, "downloaded newer item")
                            .with_item_id(remote.id.clone())
                            .with_data("sync_id", sync_id.to_string()),
                    );
                }
                Some(local) if local.version > remote.version => {
                    if self.resolver.detect(Some(&local), Some(&remote)).is_some() {
                        self.repository.append_conflict_log(ConflictLogEntry {
                            item_id: remote.id.clone(),
                            local_timestamp: local.updated_at,
                            remote_timestamp: remote.updated_at,
                            resolution: "last_write_wins".to_string(),
                            detected_at: Utc::now().timestamp(),
                        })?;
                        outcome.conflicts += 1;
                        self.events.emit(
                            Event::new(EventKind::SyncConflict, "version conflict detected")
                                .with_item_id(remote.id.clone())
                                .with_data("sync_id", sync_id.to_string()),
                        );
                    }
                }
                Some(_) => {}
            }
        }

        self.events.emit(
            Event::new(EventKind::SyncProgress, "download phase complete")
                .with_data("sync_id", sync_id.to_string())
                .with_data("phase", "download")
                .with_data("downloaded", outcome.downloaded as i64),
        );
        Ok(())
    }

    /// Spawns a background task that invokes `sync` every `interval`, but
    /// only when the engine is currently `idle`. Each invocation gets its
    /// own `SYNC_CYCLE_TIMEOUT`.
    pub fn start_periodic(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if self.status() != SyncState::Idle {
                    continue;
                }
                let engine = self.clone();
                let token = CancellationToken::new();
                let result =
                    tokio::time::timeout(SYNC_CYCLE_TIMEOUT, engine.sync(token.clone())).await;
                if result.is_err() {
                    token.cancel();
                    tracing::warn!("periodic sync cycle timed out after {:?}", SYNC_CYCLE_TIMEOUT);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ResolutionStrategy;
    use crate::repository::InMemoryRepository;
    use crate::store::InMemoryObjectStore;
    use crate::types::MediaType;

    fn item(id: &str, version: u64, updated_at: i64) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            title: "t".to_string(),
            content_text: "b".to_string(),
            source_url: None,
            media_type: MediaType::Web,
            tags: String::new(),
            summary: None,
            is_deleted: false,
            created_at: updated_at,
            updated_at,
            version,
            content_hash: None,
        }
    }

    fn make_engine() -> SyncEngine {
        SyncEngine::new(SyncEngineOptions {
            store: Arc::new(InMemoryObjectStore::new()),
            repository: Arc::new(InMemoryRepository::new()),
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 3,
        })
    }

    /// Object store whose `list` call sleeps, so a concurrent `sync()` call
    /// has a real window in which to observe `Syncing` state.
    struct SlowStore(InMemoryObjectStore);

    #[async_trait::async_trait]
    impl ObjectStore for SlowStore {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> crate::store::StoreResult<()> {
            self.0.put(key, bytes).await
        }
        async fn get(&self, key: &str) -> crate::store::StoreResult<Vec<u8>> {
            self.0.get(key).await
        }
        async fn delete(&self, key: &str) -> crate::store::StoreResult<()> {
            self.0.delete(key).await
        }
        async fn list(&self, prefix: &str) -> crate::store::StoreResult<Vec<String>> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.0.list(prefix).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_sync_calls_report_already_in_progress() {
        let engine = Arc::new(SyncEngine::new(SyncEngineOptions {
            store: Arc::new(SlowStore(InMemoryObjectStore::new())),
            repository: Arc::new(InMemoryRepository::new()),
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 100,
        }));

        let background = engine.clone();
        let handle = tokio::spawn(async move { background.sync(CancellationToken::new()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = engine.sync(CancellationToken::new()).await;
        assert!(second.already_in_progress);

        let first = handle.await.unwrap();
        assert!(!first.already_in_progress);
    }

    #[tokio::test]
    async fn cancelled_token_yields_a_cancelled_outcome() {
        let engine = make_engine();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = engine.sync(token).await;
        assert!(outcome.cancelled);
        assert_eq!(engine.status(), SyncState::Failed);
    }

    #[test]
    fn error_history_caps_at_max_error_history() {
        let engine = make_engine();
        for i in 0..5 {
            engine.record_error(Some(format!("item{i}")), "upload", "boom".to_string());
        }
        let history = engine.get_error_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].item_id, Some("item2".to_string()));
        assert_eq!(history[2].item_id, Some("item4".to_string()));
    }

    #[tokio::test]
    async fn idle_engine_has_no_pending_changes_before_first_sync() {
        let engine = make_engine();
        assert_eq!(engine.pending_changes(), 0);
        assert_eq!(engine.status(), SyncState::Idle);
        assert!(engine.last_sync().is_none());
    }

    #[tokio::test]
    async fn successful_sync_resets_pending_changes_and_records_last_sync() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_content_item(item("a", 1, 1)).unwrap();
        let engine = SyncEngine::new(SyncEngineOptions {
            store: Arc::new(InMemoryObjectStore::new()),
            repository: repo,
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 100,
        });
        let outcome = engine.sync(CancellationToken::new()).await;
        assert_eq!(outcome.uploaded, 1);
        assert_eq!(engine.pending_changes(), 0);
        assert!(engine.last_sync().is_some());
        assert_eq!(engine.status(), SyncState::Idle);
    }

    #[tokio::test]
    async fn unchanged_item_is_not_reuploaded_on_the_next_cycle() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_content_item(item("a", 1, 1)).unwrap();
        let engine = SyncEngine::new(SyncEngineOptions {
            store: Arc::new(InMemoryObjectStore::new()),
            repository: repo,
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 100,
        });

        let first = engine.sync(CancellationToken::new()).await;
        assert_eq!(first.uploaded, 1);

        let second = engine.sync(CancellationToken::new()).await;
        assert_eq!(second.uploaded, 0);
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.conflicts, 0);
    }
}
