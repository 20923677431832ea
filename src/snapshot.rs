//! The process-wide published snapshot.
//!
//! Readers clone an `Arc` under a short read lock and then work on their own
//! handle; a refresh swaps the pointer under the write lock. A snapshot is
//! never modified after it is published, so readers can't observe a mix of
//! two passes.

use crate::models::AggregateSnapshot;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// What [`SnapshotStore::publish`] did with the offered snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The offered snapshot had no items; the current one stays.
    KeptPrevious,
}

/// Holder of the published [`AggregateSnapshot`].
///
/// Published to by the refresher and read by the HTTP handlers.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<AggregateSnapshot>>,
}

impl SnapshotStore {
    /// A store holding the empty snapshot.
    pub fn new() -> Self {
        Self::with_snapshot(AggregateSnapshot::empty())
    }

    pub fn with_snapshot(snapshot: AggregateSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<AggregateSnapshot> {
        // The lock only ever guards a pointer swap, so a poisoned lock still holds a whole snapshot.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish `snapshot` unless it is empty.
    ///
    /// A pass that found nothing at all leaves whatever was published before
    /// in place.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The result of a finished pass
    ///
    /// # Returns
    ///
    /// [`PublishOutcome::Published`] when the snapshot replaced the current
    /// one, [`PublishOutcome::KeptPrevious`] when it had no items.
    pub fn publish(&self, snapshot: AggregateSnapshot) -> PublishOutcome {
        if snapshot.is_empty() {
            let previous = self.current();
            warn!(
                previous_total = previous.total_items,
                "Refresh produced no items; keeping previous snapshot"
            );
            return PublishOutcome::KeptPrevious;
        }

        let total_items = snapshot.total_items;
        let next = Arc::new(snapshot);
        {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *guard = next;
        }
        info!(total_items, "Published new snapshot");
        PublishOutcome::Published
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
