//! Bounded in-memory offline queue (spec §4.5).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Upload,
    Download,
    Delete,
    Analyse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A deferred operation. Process-scoped — lost on restart, an accepted
/// limitation (the repository's change log is the durable audit, spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    pub operation: OperationKind,
    pub payload: Value,
    pub state: QueueState,
    pub attempts: u32,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Usage errors specific to the queue's state machine.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("no such queue item: {0}")]
    NotFound(u64),

    #[error("invalid transition for item {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: u64,
        from: QueueState,
        to: QueueState,
    },
}

impl From<QueueError> for CoreError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Full { capacity } => CoreError::QueueFull { capacity },
            other => CoreError::DatabaseError(other.to_string()),
        }
    }
}

/// Bounded FIFO of `QueueItem`s. Safe under concurrent callers — the whole
/// map is behind one `parking_lot::Mutex` (spec §5: "the queue protects its
/// internal map + counters with a mutex").
///
/// Capacity bounds the number of items currently `pending` or `processing`;
/// terminal items (`completed`/`failed`) are retained for `stats()` and
/// history but don't count against the limit.
pub struct SyncQueue {
    capacity: usize,
    next_id: AtomicU64,
    items: Mutex<BTreeMap<u64, QueueItem>>,
}

impl SyncQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn enqueue(
        &self,
        operation: OperationKind,
        payload: Value,
    ) -> Result<u64, QueueError> {
        let mut items = self.items.lock();
        let in_flight = items
            .values()
            .filter(|i| matches!(i.state, QueueState::Pending | QueueState::Processing))
            .count();
        if in_flight >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        items.insert(
            id,
            QueueItem {
                id,
                operation,
                payload,
                state: QueueState::Pending,
                attempts: 0,
                created_at: Utc::now().timestamp(),
                last_error: None,
            },
        );
        Ok(id)
    }

    /// Snapshot of items in state `pending`, oldest first (the `BTreeMap`'s
    /// key order is monotonic insertion-id order).
    pub fn get_pending(&self) -> Vec<QueueItem> {
        self.items
            .lock()
            .values()
            .filter(|i| i.state == QueueState::Pending)
            .cloned()
            .collect()
    }

    pub fn mark_processing(&self, id: u64) -> Result<(), QueueError> {
        let mut items = self.items.lock();
        let item = items.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if item.state != QueueState::Pending {
            return Err(QueueError::InvalidTransition {
                id,
                from: item.state,
                to: QueueState::Processing,
            });
        }
        item.state = QueueState::Processing;
        item.attempts += 1;
        Ok(())
    }

    pub fn complete(&self, id: u64) -> Result<(), QueueError> {
        let mut items = self.items.lock();
        let item = items.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if item.state != QueueState::Processing {
            return Err(QueueError::InvalidTransition {
                id,
                from: item.state,
                to: QueueState::Completed,
            });
        }
        item.state = QueueState::Completed;
        item.last_error = None;
        Ok(())
    }

    pub fn fail(&self, id: u64, error: impl Into<String>) -> Result<(), QueueError> {
        let mut items = self.items.lock();
        let item = items.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        if item.state != QueueState::Processing {
            return Err(QueueError::InvalidTransition {
                id,
                from: item.state,
                to: QueueState::Failed,
            });
        }
        item.state = QueueState::Failed;
        item.last_error = Some(error.into());
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        let items = self.items.lock();
        let mut stats = QueueStats::default();
        for item in items.values() {
            match item.state {
                QueueState::Pending => stats.pending += 1,
                QueueState::Processing => stats.processing += 1,
                QueueState::Completed => stats.completed += 1,
                QueueState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}
