//! Non-blocking, drop-safe event fabric shared by the sync engine, scheduler
//! and analysis orchestrator (spec §4.1).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of event kinds the core can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SyncStarted,
    SyncProgress,
    SyncUploadItem,
    SyncDownloadItem,
    SyncConflict,
    SyncCompleted,
    SyncFailed,
    SyncWarning,
    AnalysisStarted,
    AnalysisCompleted,
    AnalysisFailed,
}

/// One notification published onto the bus. Mirrors the emitted-event
/// envelope in spec §6 (`data` serialises as the `data` object there).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Unix seconds. `0` means "unset" — `EventBus::emit` fills it in.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: 0,
            item_id: None,
            message: message.into(),
            error: None,
            data: HashMap::new(),
        }
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A subscriber is a plain, synchronous callback. Per spec §5
/// ("event-handler discipline"), it MUST return quickly — expensive work is
/// the subscriber's job to hand off to its own queue.
pub type Subscriber = Arc<dyn Fn(Event) + Send + Sync>;

/// Single-subscriber, non-blocking event bus.
///
/// `emit` never waits on the subscriber: delivery happens on a detached
/// blocking task so a subscriber that sleeps, blocks, or panics can never
/// slow down or crash the caller. At most one subscriber is active at a
/// time; swapping it is atomic (a single `RwLock` write).
#[derive(Default)]
pub struct EventBus {
    subscriber: RwLock<Option<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriber: RwLock::new(None),
        }
    }

    /// Atomically replace the current subscriber. `None` unsubscribes.
    pub fn subscribe(&self, handler: Option<Subscriber>) {
        *self.subscriber.write() = handler;
    }

    /// Publish an event. Returns immediately; delivery (if any subscriber is
    /// registered) happens on a detached task. Panics inside the subscriber
    /// are caught and logged, never propagated.
    pub fn emit(&self, mut event: Event) {
        if event.timestamp == 0 {
            event.timestamp = Utc::now().timestamp();
        }

        let handler = self.subscriber.read().clone();
        let Some(handler) = handler else {
            return;
        };

        tokio::task::spawn_blocking(move || {
            let kind = event.kind;
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
            if let Err(panic) = result {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "subscriber panicked".to_string());
                tracing::error!(?kind, panic = %msg, "event subscriber panicked");
            }
        });
    }
}
