//! Persistence and live-update port.
//!
//! The engine writes through [`Store`] and dashboards read through
//! [`Store::subscribe`]. Two implementations ship: [`memory::MemoryStore`]
//! for tests and single-process use, and the Postgres-backed
//! [`crate::db::Db`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::event::StoreEvent;
use crate::model::{Assignment, AssignmentId, ProgressId, ProgressRecord};

/// Capacity of per-store event channels. A subscriber that falls further
/// behind than this receives [`Received::Lagged`] and must resync.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The persistence collaborator.
///
/// Writes resolve only once the store has acknowledged them. Per-record
/// updates are last-write-wins.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()>;

    /// Record that the creation notification was accepted.
    async fn mark_emails_sent(&self, id: AssignmentId) -> Result<()>;

    /// Insert a batch of progress records, in fan-out order. All or nothing.
    async fn insert_progress(&self, records: &[ProgressRecord]) -> Result<()>;

    /// Overwrite the mutable fields of one record: status, completion
    /// date, remarks, follow-ups and update stamp.
    async fn update_progress(&self, record: &ProgressRecord) -> Result<()>;

    /// Remove an assignment together with its progress records.
    ///
    /// Only used to compensate a failed fan-out.
    async fn delete_assignment(&self, id: AssignmentId) -> Result<()>;

    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment>;

    async fn get_progress(&self, id: ProgressId) -> Result<ProgressRecord>;

    /// Progress records of one assignment, in fan-out order.
    async fn progress_for(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressRecord>>;

    /// Both collections; assignments ordered by creation time, newest first.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Register for change events. Dropping the subscription unregisters it.
    async fn subscribe(&self) -> Result<Subscription>;
}

/// Immutable copy of both collections at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Newest first.
    pub assignments: Vec<Assignment>,
    pub progress: Vec<ProgressRecord>,
}

impl Snapshot {
    pub fn assignment(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub fn progress_for(&self, id: AssignmentId) -> impl Iterator<Item = &ProgressRecord> {
        self.progress.iter().filter(move |r| r.assignment_id == id)
    }
}

/// What a subscriber receives next.
#[derive(Debug)]
pub enum Received {
    Event(StoreEvent),
    /// This many events were dropped. Incremental state is stale; rebuild
    /// from the next event's snapshot.
    Lagged(u64),
}

/// A live registration with a store.
pub struct Subscription {
    initial: Arc<Snapshot>,
    rx: broadcast::Receiver<StoreEvent>,
}

impl Subscription {
    pub(crate) fn new(initial: Arc<Snapshot>, rx: broadcast::Receiver<StoreEvent>) -> Self {
        Self { initial, rx }
    }

    /// Snapshot taken when the subscription was registered.
    pub fn initial(&self) -> &Arc<Snapshot> {
        &self.initial
    }

    /// Wait for the next event. `None` once the store has shut down.
    pub async fn recv(&mut self) -> Option<Received> {
        match self.rx.recv().await {
            Ok(event) => Some(Received::Event(event)),
            Err(broadcast::error::RecvError::Lagged(n)) => Some(Received::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
