use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::{ChangeOp, EntityKind};
use crate::store::Applied;

/// Counters for change events seen by the dispatch loop
#[derive(Debug, Default, Clone)]
pub struct FeedStats {
    /// Received events by (entity, operation)
    pub by_event: HashMap<(EntityKind, ChangeOp), u64>,
    /// Total events received
    pub total: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub stale: u64,
    /// Events referencing a ticket that is not loaded
    pub orphaned: u64,
    /// Events dropped because their pre-fetch failed
    pub failed: u64,
    /// Events this engine does not act on (message updates and deletes)
    pub ignored: u64,
}

impl FeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&mut self, entity: EntityKind, op: ChangeOp) {
        self.total += 1;
        *self.by_event.entry((entity, op)).or_insert(0) += 1;
    }

    pub fn record_outcome(&mut self, outcome: Applied) {
        match outcome {
            Applied::Applied => self.applied += 1,
            Applied::Duplicate => self.duplicates += 1,
            Applied::Stale => self.stale += 1,
            Applied::UnknownTicket => self.orphaned += 1,
        }
    }

    /// Event kinds sorted by count (descending)
    pub fn events_by_count(&self) -> Vec<((EntityKind, ChangeOp), u64)> {
        let mut events: Vec<_> = self.by_event.iter().map(|(&k, &c)| (k, c)).collect();
        events.sort_by(|a, b| b.1.cmp(&a.1));
        events
    }
}

/// Thread-safe wrapper for feed stats
#[derive(Debug, Clone, Default)]
pub struct SharedFeedStats {
    inner: Arc<RwLock<FeedStats>>,
}

impl SharedFeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, entity: EntityKind, op: ChangeOp) {
        self.inner.write().record_received(entity, op);
    }

    pub fn record_outcome(&self, outcome: Applied) {
        self.inner.write().record_outcome(outcome);
    }

    pub fn record_failed(&self) {
        self.inner.write().failed += 1;
    }

    pub fn record_ignored(&self) {
        self.inner.write().ignored += 1;
    }

    pub fn snapshot(&self) -> FeedStats {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_event_and_outcome() {
        let stats = SharedFeedStats::new();
        stats.record_received(EntityKind::Message, ChangeOp::Insert);
        stats.record_received(EntityKind::Message, ChangeOp::Insert);
        stats.record_received(EntityKind::Ticket, ChangeOp::Delete);
        stats.record_outcome(Applied::Applied);
        stats.record_outcome(Applied::Duplicate);
        stats.record_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.applied, 1);
        assert_eq!(snapshot.duplicates, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(
            snapshot.events_by_count()[0],
            ((EntityKind::Message, ChangeOp::Insert), 2)
        );
    }
}
