//! Periodic sync/queue-drain ticker with an online/offline gate (spec §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, Result};
use crate::queue::{QueueStats, SyncQueue};
use crate::sync::engine::{SyncEngine, SyncOutcome, SyncState, SYNC_CYCLE_TIMEOUT};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub is_online: bool,
    pub last_sync_at: Option<i64>,
    pub sync_in_progress: bool,
    pub queue_in_progress: bool,
    pub pending_items: usize,
    pub queue_stats: QueueStats,
}

pub struct SchedulerOptions {
    pub engine: Arc<SyncEngine>,
    pub queue: Arc<SyncQueue>,
    pub sync_interval: Duration,
    pub queue_interval: Duration,
}

/// Drives two independent tickers — one firing `SyncEngine::sync`, one
/// draining the `SyncQueue` — and gates both behind an online/offline flag
/// the caller toggles as connectivity changes (spec §4.7). `start` is
/// idempotent; `stop` is not — calling it twice returns
/// `SchedulerAlreadyStopped` (spec §9's resolved open question).
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    queue: Arc<SyncQueue>,
    sync_interval: Duration,
    queue_interval: Duration,
    online: Arc<AtomicBool>,
    running: RwLock<Option<SchedulerHandles>>,
}

struct SchedulerHandles {
    sync_task: JoinHandle<()>,
    queue_task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            engine: options.engine,
            queue: options.queue,
            sync_interval: options.sync_interval,
            queue_interval: options.queue_interval,
            online: Arc::new(AtomicBool::new(true)),
            running: RwLock::new(None),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Starts both tickers. Calling `start` while already running is a
    /// no-op — idempotent, unlike `stop`.
    pub fn start(self: &Arc<Self>) {
        if self.running.read().is_some() {
            return;
        }
        let mut running = self.running.write();
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();

        let sync_task = {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.sync_interval);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if scheduler.is_online() {
                                let token = CancellationToken::new();
                                let _ = scheduler.engine.sync(token).await;
                            }
                        }
                    }
                }
            })
        };

        let queue_task = {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(scheduler.queue_interval);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            // Unlike the sync ticker, the queue ticker drains
                            // regardless of connectivity — queued work still
                            // needs to advance while offline (spec §4.7).
                            scheduler.drain_queue_once();
                        }
                    }
                }
            })
        };

        *running = Some(SchedulerHandles {
            sync_task,
            queue_task,
            cancel,
        });
    }

    /// Stops both tickers. Returns `SchedulerAlreadyStopped` if `stop` was
    /// already called (or `start` was never called) — not idempotent, by
    /// design, so a caller can detect a double-stop bug.
    pub fn stop(&self) -> Result<()> {
        let handles = self.running.write().take();
        match handles {
            Some(handles) => {
                handles.cancel.cancel();
                handles.sync_task.abort();
                handles.queue_task.abort();
                Ok(())
            }
            None => Err(CoreError::SchedulerAlreadyStopped),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let queue_stats = self.queue.stats();
        SchedulerStatus {
            is_running: self.running.read().is_some(),
            is_online: self.is_online(),
            last_sync_at: self.engine.last_sync(),
            sync_in_progress: self.engine.status() == SyncState::Syncing,
            queue_in_progress: queue_stats.processing > 0,
            pending_items: queue_stats.pending,
            queue_stats,
        }
    }

    /// Pulls every currently-pending queue item and marks it
    /// processing/completed. The queue's own state machine (spec §4.5) is
    /// the source of truth; this just drives it forward once.
    fn drain_queue_once(&self) {
        for item in self.queue.get_pending() {
            if self.queue.mark_processing(item.id).is_err() {
                continue;
            }
            // Queue items are opaque payloads the surrounding application
            // enqueued; this scheduler's job is only to advance their state
            // machine on a schedule, not to interpret `operation`/`payload`.
            if let Err(e) = self.queue.complete(item.id) {
                tracing::warn!(id = item.id, error = %e, "failed to complete queue item");
            }
        }
    }

    /// Force a sync cycle outside the regular tick, returning its outcome
    /// directly. Bounded by `SYNC_CYCLE_TIMEOUT`, same as a periodic tick —
    /// a wedged cycle is cancelled rather than left to hang indefinitely.
    pub async fn sync_now(&self) -> SyncOutcome {
        let token = CancellationToken::new();
        match tokio::time::timeout(SYNC_CYCLE_TIMEOUT, self.engine.sync(token.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                token.cancel();
                tracing::warn!("triggered sync cycle timed out after {:?}", SYNC_CYCLE_TIMEOUT);
                SyncOutcome {
                    cancelled: true,
                    error: Some(format!(
                        "sync cycle timed out after {:?}",
                        SYNC_CYCLE_TIMEOUT
                    )),
                    ..Default::default()
                }
            }
        }
    }

    /// Fire-and-forget variant: spawns the cycle and returns whether it was
    /// actually started. `false` means a cycle was already in flight — the
    /// request is dropped, not queued (spec §4.7).
    pub fn trigger_sync(self: &Arc<Self>) -> bool {
        if self.engine.status() == SyncState::Syncing {
            return false;
        }
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _ = scheduler.sync_now().await;
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictResolver, ResolutionStrategy};
    use crate::event::EventBus;
    use crate::repository::InMemoryRepository;
    use crate::store::InMemoryObjectStore;
    use crate::sync::engine::SyncEngineOptions;

    fn make_scheduler() -> Arc<Scheduler> {
        let engine = Arc::new(SyncEngine::new(SyncEngineOptions {
            store: Arc::new(InMemoryObjectStore::new()),
            repository: Arc::new(InMemoryRepository::new()),
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 100,
        }));
        let queue = Arc::new(SyncQueue::new(10));
        Arc::new(Scheduler::new(SchedulerOptions {
            engine,
            queue,
            sync_interval: Duration::from_millis(20),
            queue_interval: Duration::from_millis(20),
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_without_start_is_already_stopped() {
        let scheduler = make_scheduler();
        assert!(matches!(scheduler.stop(), Err(CoreError::SchedulerAlreadyStopped)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn double_stop_returns_already_stopped() {
        let scheduler = make_scheduler();
        scheduler.start();
        scheduler.stop().unwrap();
        assert!(matches!(scheduler.stop(), Err(CoreError::SchedulerAlreadyStopped)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_is_idempotent() {
        let scheduler = make_scheduler();
        scheduler.start();
        scheduler.start();
        assert!(scheduler.status().is_running);
        scheduler.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn offline_gate_prevents_sync_ticks() {
        let scheduler = make_scheduler();
        scheduler.set_online(false);
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(scheduler.engine.last_sync(), None);
        scheduler.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sync_now_runs_a_cycle_immediately() {
        let scheduler = make_scheduler();
        let outcome = scheduler.sync_now().await;
        assert!(!outcome.already_in_progress);
        assert!(scheduler.engine.last_sync().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn draining_advances_pending_items_to_completed() {
        let scheduler = make_scheduler();
        scheduler
            .queue
            .enqueue(crate::queue::OperationKind::Upload, serde_json::json!({}))
            .unwrap();
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let stats = scheduler.queue.stats();
        assert_eq!(stats.completed, 1);
        scheduler.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queue_drains_even_while_offline() {
        let scheduler = make_scheduler();
        scheduler.set_online(false);
        scheduler
            .queue
            .enqueue(crate::queue::OperationKind::Upload, serde_json::json!({}))
            .unwrap();
        scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.queue.stats().completed, 1);
        scheduler.stop().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn status_reports_last_sync_and_queue_counters() {
        let scheduler = make_scheduler();
        scheduler
            .queue
            .enqueue(crate::queue::OperationKind::Upload, serde_json::json!({}))
            .unwrap();

        let before = scheduler.status();
        assert!(!before.is_running);
        assert!(before.last_sync_at.is_none());
        assert!(!before.sync_in_progress);
        assert_eq!(before.pending_items, 1);

        scheduler.sync_now().await;
        let after = scheduler.status();
        assert!(after.last_sync_at.is_some());
        assert!(!after.sync_in_progress);
    }

    /// Object store whose `list` call sleeps, giving a just-triggered sync a
    /// real window in which a second `trigger_sync` can observe `Syncing`.
    struct SlowStore(InMemoryObjectStore);

    #[async_trait::async_trait]
    impl crate::store::ObjectStore for SlowStore {
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

    fn make_scheduler_with_slow_store() -> Arc<Scheduler> {
        let engine = Arc::new(SyncEngine::new(SyncEngineOptions {
            store: Arc::new(SlowStore(InMemoryObjectStore::new())),
            repository: Arc::new(InMemoryRepository::new()),
            events: Arc::new(EventBus::new()),
            resolver: ConflictResolver::new(ResolutionStrategy::LastWriteWins),
            max_error_history: 100,
        }));
        let queue = Arc::new(SyncQueue::new(10));
        Arc::new(Scheduler::new(SchedulerOptions {
            engine,
            queue,
            sync_interval: Duration::from_millis(20),
            queue_interval: Duration::from_millis(20),
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trigger_sync_returns_false_when_a_cycle_is_already_running() {
        let scheduler = make_scheduler_with_slow_store();
        assert!(scheduler.trigger_sync());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!scheduler.trigger_sync());
    }
}
