//! Conflict detection and resolution (spec §4.4).

use chrono::Utc;

use crate::error::{CoreError, Result};
use crate::types::{ContentItem, ConflictLogEntry};

/// Which policy `ConflictResolver::resolve` applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    LastWriteWins,
    Manual,
}

/// A detected divergence: both sides exist, ids match, versions differ.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub local: ContentItem,
    pub remote: ContentItem,
}

/// The result of resolving a `Conflict`: the winning snapshot plus the
/// `ConflictLogEntry` the caller should persist via
/// `Repository::append_conflict_log`.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub winner: ContentItem,
    pub log: ConflictLogEntry,
}

/// Stateless resolver parameterised by a chosen strategy.
pub struct ConflictResolver {
    strategy: ResolutionStrategy,
}

impl ConflictResolver {
    pub fn new(strategy: ResolutionStrategy) -> Self {
        Self { strategy }
    }

    /// Yields a conflict iff both items exist, their ids match, and their
    /// versions differ. Returns `None` — not an error — for the nil-argument
    /// case and the id-mismatch case: the caller is asking "are these in
    /// conflict", and the answer to both is simply "no".
    pub fn detect(
        &self,
        local: Option<&ContentItem>,
        remote: Option<&ContentItem>,
    ) -> Option<Conflict> {
        let (local, remote) = (local?, remote?);
        if local.id != remote.id || local.version == remote.version {
            return None;
        }
        Some(Conflict {
            local: local.clone(),
            remote: remote.clone(),
        })
    }

    /// Resolves a conflict by the configured strategy. Errors only when
    /// either side is missing (`invalid_conflict`) or the ids mismatch
    /// (`item_id_mismatch`) — both are caller-usage errors, not normal
    /// conflict outcomes.
    pub fn resolve(
        &self,
        local: Option<&ContentItem>,
        remote: Option<&ContentItem>,
    ) -> Result<ResolveOutcome> {
        let local = local.ok_or_else(|| {
            CoreError::InvalidConflict("local item is missing".to_string())
        })?;
        let remote = remote.ok_or_else(|| {
            CoreError::InvalidConflict("remote item is missing".to_string())
        })?;
        if local.id != remote.id {
            return Err(CoreError::ItemIdMismatch {
                local: local.id.clone(),
                remote: remote.id.clone(),
            });
        }

        let (winner, resolution) = match self.strategy {
            ResolutionStrategy::LastWriteWins => {
                if local.updated_at >= remote.updated_at {
                    (local, "local_wins")
                } else {
                    (remote, "remote_wins")
                }
            }
            ResolutionStrategy::Manual => (local, "manual_review_required"),
        };

        Ok(ResolveOutcome {
            winner: winner.clone(),
            log: ConflictLogEntry {
                item_id: local.id.clone(),
                local_timestamp: local.updated_at,
                remote_timestamp: remote.updated_at,
                resolution: resolution.to_string(),
                detected_at: Utc::now().timestamp(),
            },
        })
    }

    /// True iff the two timestamps differ by more than one second — a
    /// conflict this close together is left for a human to look at even
    /// under `LastWriteWins`.
    pub fn should_auto_resolve(&self, conflict: &Conflict) -> bool {
        (conflict.local.updated_at - conflict.remote.updated_at).abs() > 1
    }

    /// Field-level CRDT merge is an explicit unsupported operation — this is
    /// a design decision (spec Non-goals), not a missing feature.
    pub fn merge(&self, _local: &ContentItem, _remote: &ContentItem) -> Result<ContentItem> {
        Err(CoreError::MergeNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn detect_none_when_either_side_missing() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let local = item("a", 1, 1);
        assert!(resolver.detect(Some(&local), None).is_none());
        assert!(resolver.detect(None, Some(&local)).is_none());
        assert!(resolver.detect(None, None).is_none());
    }

    #[test]
    fn detect_none_on_id_mismatch_without_erroring() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let a = item("a", 1, 1);
        let b = item("b", 2, 1);
        assert!(resolver.detect(Some(&a), Some(&b)).is_none());
    }

    #[test]
    fn detect_none_when_versions_equal() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let a = item("a", 1, 1);
        let a2 = item("a", 1, 1);
        assert!(resolver.detect(Some(&a), Some(&a2)).is_none());
    }

    #[test]
    fn detect_some_when_ids_match_and_versions_differ() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let local = item("a", 2, 10);
        let remote = item("a", 1, 5);
        assert!(resolver.detect(Some(&local), Some(&remote)).is_some());
    }

    #[test]
    fn resolve_errors_on_missing_side() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let local = item("a", 1, 1);
        assert!(matches!(
            resolver.resolve(Some(&local), None),
            Err(CoreError::InvalidConflict(_))
        ));
    }

    #[test]
    fn resolve_errors_on_id_mismatch() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let a = item("a", 1, 1);
        let b = item("b", 1, 1);
        assert!(matches!(
            resolver.resolve(Some(&a), Some(&b)),
            Err(CoreError::ItemIdMismatch { .. })
        ));
    }

    #[test]
    fn lww_ties_go_to_local() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let local = item("a", 2, 100);
        let remote = item("a", 1, 100);
        let outcome = resolver.resolve(Some(&local), Some(&remote)).unwrap();
        assert_eq!(outcome.winner.version, 2);
        assert_eq!(outcome.log.resolution, "local_wins");
    }

    #[test]
    fn lww_picks_larger_updated_at() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let local = item("a", 1, 50);
        let remote = item("a", 2, 100);
        let outcome = resolver.resolve(Some(&local), Some(&remote)).unwrap();
        assert_eq!(outcome.winner.version, 2);
        assert_eq!(outcome.log.resolution, "remote_wins");
    }

    #[test]
    fn lww_determinism_swapping_sides_does_not_change_the_winner() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let a = item("x", 1, 50);
        let b = item("x", 2, 100);
        let o1 = resolver.resolve(Some(&a), Some(&b)).unwrap();
        let o2 = resolver.resolve(Some(&b), Some(&a)).unwrap();
        // Winner is always the side with the larger updated_at (b), regardless
        // of which argument position it's passed in.
        assert_eq!(o1.winner.updated_at, 100);
        assert_eq!(o2.winner.updated_at, 100);
    }

    #[test]
    fn manual_strategy_always_picks_local() {
        let resolver = ConflictResolver::new(ResolutionStrategy::Manual);
        let local = item("a", 1, 1);
        let remote = item("a", 2, 999);
        let outcome = resolver.resolve(Some(&local), Some(&remote)).unwrap();
        assert_eq!(outcome.winner.version, 1);
        assert_eq!(outcome.log.resolution, "manual_review_required");
    }

    #[test]
    fn should_auto_resolve_requires_more_than_one_second_apart() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let conflict = Conflict {
            local: item("a", 2, 101),
            remote: item("a", 1, 100),
        };
        assert!(!resolver.should_auto_resolve(&conflict));

        let conflict2 = Conflict {
            local: item("a", 2, 102),
            remote: item("a", 1, 100),
        };
        assert!(resolver.should_auto_resolve(&conflict2));
    }

    #[test]
    fn merge_is_always_unsupported() {
        let resolver = ConflictResolver::new(ResolutionStrategy::LastWriteWins);
        let a = item("a", 1, 1);
        let b = item("a", 2, 2);
        assert!(matches!(
            resolver.merge(&a, &b),
            Err(CoreError::MergeNotSupported)
        ));
    }
}
