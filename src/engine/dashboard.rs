//! Live dashboard: an [`Aggregator`] kept current from a subscription.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::aggregate::{Aggregator, DashboardStats};
use crate::error::Result;
use crate::model::AssignmentId;
use crate::store::{Received, Snapshot, Store, Subscription};

/// Follows a store's change stream and maintains statistics.
///
/// Applying a change twice is harmless, so an event that repeats what the
/// initial snapshot already contained does not skew the counters.
pub struct Dashboard {
    subscription: Subscription,
    aggregator: Aggregator,
    snapshot: Arc<Snapshot>,
    last_seq: u64,
    stale: bool,
}

impl Dashboard {
    /// Subscribe to `store` and seed counters from its current contents.
    pub async fn follow(store: &dyn Store) -> Result<Self> {
        Ok(Self::from_subscription(store.subscribe().await?))
    }

    pub fn from_subscription(subscription: Subscription) -> Self {
        let snapshot = Arc::clone(subscription.initial());
        Self {
            aggregator: Aggregator::from_snapshot(&snapshot),
            subscription,
            snapshot,
            last_seq: 0,
            stale: false,
        }
    }

    /// Wait for the next change and fold it in.
    ///
    /// Returns false once the store stops delivering events.
    pub async fn next(&mut self) -> bool {
        loop {
            match self.subscription.recv().await {
                None => return false,
                Some(Received::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind, resyncing from next snapshot");
                    self.stale = true;
                }
                Some(Received::Event(event)) => {
                    if self.stale {
                        self.aggregator.rebuild(&event.snapshot);
                        self.stale = false;
                    } else {
                        self.aggregator.apply_all(&event.changes);
                    }
                    debug!(seq = event.seq, changes = event.changes.len(), "dashboard updated");
                    self.last_seq = event.seq;
                    self.snapshot = event.snapshot;
                    return true;
                }
            }
        }
    }

    pub fn stats(&self, now: DateTime<Utc>) -> DashboardStats {
        self.aggregator.stats(now)
    }

    pub fn progress(&self, id: AssignmentId) -> f64 {
        self.aggregator.progress(id)
    }

    /// Latest snapshot seen.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Sequence number of the last applied event; 0 before the first.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }
}
