//! Persistence contract for content items, change logs and conflict logs
//! (spec §4.3). The core uses this capability interface exclusively —
//! transactions, indexing and schema are the repository's problem.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{CoreError, Result};
use crate::types::{ChangeLogEntry, ConflictLogEntry, ContentItem};

/// Narrows `list_content_items` to non-deleted (default) or all items.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentItemFilter {
    pub include_deleted: bool,
}

impl ContentItemFilter {
    pub fn non_deleted() -> Self {
        Self {
            include_deleted: false,
        }
    }

    pub fn all() -> Self {
        Self {
            include_deleted: true,
        }
    }
}

/// Capability interface the sync engine consumes. All calls are synchronous
/// from the engine's viewpoint (spec §4.3) — the repository owns whatever
/// concurrency control it needs internally.
pub trait Repository: Send + Sync {
    fn list_content_items(
        &self,
        limit: usize,
        offset: usize,
        filter: ContentItemFilter,
    ) -> Result<Vec<ContentItem>>;

    fn get_content_item(&self, id: &str) -> Result<Option<ContentItem>>;

    fn create_content_item(&self, item: ContentItem) -> Result<()>;

    fn update_content_item(&self, item: ContentItem) -> Result<()>;

    fn append_change_log(&self, entry: ChangeLogEntry) -> Result<()>;

    fn append_conflict_log(&self, entry: ConflictLogEntry) -> Result<()>;

    /// Reader for the append-only conflict log, newest first. Resolves the
    /// open question in spec §9: the engine only appends, a surrounding
    /// collaborator reads.
    fn list_conflict_logs(&self, limit: usize, offset: usize) -> Result<Vec<ConflictLogEntry>>;

    /// Reader for one item's change history, newest first.
    fn list_change_logs(&self, item_id: &str, limit: usize) -> Result<Vec<ChangeLogEntry>>;
}

/// In-memory `Repository`, guarded by `parking_lot::RwLock` per the
/// thread-safety assumption in spec §5. Exported as test tooling for this
/// crate and for downstream integration tests.
#[derive(Default)]
pub struct InMemoryRepository {
    items: RwLock<BTreeMap<String, ContentItem>>,
    change_log: RwLock<Vec<ChangeLogEntry>>,
    conflict_log: RwLock<Vec<ConflictLogEntry>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for InMemoryRepository {
    fn list_content_items(
        &self,
        limit: usize,
        offset: usize,
        filter: ContentItemFilter,
    ) -> Result<Vec<ContentItem>> {
        let items = self.items.read();
        Ok(items
            .values()
            .filter(|i| filter.include_deleted || !i.is_deleted)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_content_item(&self, id: &str) -> Result<Option<ContentItem>> {
        Ok(self.items.read().get(id).cloned())
    }

    fn create_content_item(&self, item: ContentItem) -> Result<()> {
        self.items.write().insert(item.id.clone(), item);
        Ok(())
    }

    fn update_content_item(&self, item: ContentItem) -> Result<()> {
        self.items.write().insert(item.id.clone(), item);
        Ok(())
    }

    fn append_change_log(&self, entry: ChangeLogEntry) -> Result<()> {
        self.change_log.write().push(entry);
        Ok(())
    }

    fn append_conflict_log(&self, entry: ConflictLogEntry) -> Result<()> {
        self.conflict_log.write().push(entry);
        Ok(())
    }

    fn list_conflict_logs(&self, limit: usize, offset: usize) -> Result<Vec<ConflictLogEntry>> {
        let log = self.conflict_log.read();
        Ok(log
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn list_change_logs(&self, item_id: &str, limit: usize) -> Result<Vec<ChangeLogEntry>> {
        let log = self.change_log.read();
        Ok(log
            .iter()
            .rev()
            .filter(|e| e.item_id == item_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Convenience used by error paths that want to surface a repository
/// failure as the spec's `database_error` variant.
pub fn database_error(msg: impl Into<String>) -> CoreError {
    CoreError::DatabaseError(msg.into())
}
