//! In-process store.
//!
//! Holds both collections behind one async mutex and publishes a
//! [`StoreEvent`] on a broadcast channel after every write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast};

use super::{EVENT_CHANNEL_CAPACITY, Snapshot, Store, Subscription};
use crate::error::{Error, Result};
use crate::event::{Change, StoreEvent};
use crate::model::{Assignment, AssignmentId, ProgressId, ProgressRecord};

pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<StoreEvent>,
}

#[derive(Default)]
struct State {
    /// Insertion order; snapshots sort newest first.
    assignments: Vec<Assignment>,
    progress: Vec<ProgressRecord>,
    seq: u64,
}

impl State {
    fn snapshot(&self) -> Snapshot {
        let mut assignments = self.assignments.clone();
        assignments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Snapshot {
            assignments,
            progress: self.progress.clone(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
        }
    }

    /// Publish while still holding the state lock so events leave in
    /// write order.
    fn publish(&self, state: &mut State, changes: Vec<Change>) {
        state.seq += 1;
        let event = StoreEvent {
            seq: state.seq,
            timestamp: Utc::now(),
            snapshot: Arc::new(state.snapshot()),
            changes,
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.assignments.iter().any(|a| a.id == assignment.id) {
            return Err(Error::Other(format!(
                "assignment {} already exists",
                assignment.id
            )));
        }
        state.assignments.push(assignment.clone());
        self.publish(
            &mut state,
            vec![Change::AssignmentCreated {
                assignment: assignment.clone(),
            }],
        );
        Ok(())
    }

    async fn mark_emails_sent(&self, id: AssignmentId) -> Result<()> {
        let mut state = self.state.lock().await;
        let assignment = state
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("assignment {id}")))?;
        if assignment.emails_sent {
            return Ok(());
        }
        assignment.emails_sent = true;
        let assignment = assignment.clone();
        self.publish(&mut state, vec![Change::AssignmentUpdated { assignment }]);
        Ok(())
    }

    async fn insert_progress(&self, records: &[ProgressRecord]) -> Result<()> {
        let mut state = self.state.lock().await;

        // Validate the whole batch before touching anything.
        for (i, record) in records.iter().enumerate() {
            if !state.assignments.iter().any(|a| a.id == record.assignment_id) {
                return Err(Error::NotFound(format!(
                    "assignment {}",
                    record.assignment_id
                )));
            }
            let clashes = |r: &ProgressRecord| {
                r.id == record.id
                    || (r.assignment_id == record.assignment_id
                        && r.branch_code == record.branch_code)
            };
            if state.progress.iter().any(clashes) || records[..i].iter().any(clashes) {
                return Err(Error::Other(format!(
                    "duplicate progress record for assignment {} at branch {}",
                    record.assignment_id, record.branch_code
                )));
            }
        }

        state.progress.extend(records.iter().cloned());
        let changes = records
            .iter()
            .map(|record| Change::ProgressCreated {
                record: record.clone(),
            })
            .collect();
        self.publish(&mut state, changes);
        Ok(())
    }

    async fn update_progress(&self, record: &ProgressRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .progress
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::NotFound(format!("progress record {}", record.id)))?;
        *slot = record.clone();
        self.publish(
            &mut state,
            vec![Change::ProgressUpdated {
                record: record.clone(),
            }],
        );
        Ok(())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<()> {
        let mut state = self.state.lock().await;
        let before = state.assignments.len();
        state.assignments.retain(|a| a.id != id);
        if state.assignments.len() == before {
            return Err(Error::NotFound(format!("assignment {id}")));
        }
        state.progress.retain(|r| r.assignment_id != id);
        self.publish(&mut state, vec![Change::AssignmentRemoved { id }]);
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Assignment> {
        let state = self.state.lock().await;
        state
            .assignments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("assignment {id}")))
    }

    async fn get_progress(&self, id: ProgressId) -> Result<ProgressRecord> {
        let state = self.state.lock().await;
        state
            .progress
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("progress record {id}")))
    }

    async fn progress_for(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .progress
            .iter()
            .filter(|r| r.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.state.lock().await.snapshot())
    }

    async fn subscribe(&self) -> Result<Subscription> {
        // Subscribe under the lock so no write slips between the initial
        // snapshot and the first event.
        let state = self.state.lock().await;
        let rx = self.events.subscribe();
        Ok(Subscription::new(Arc::new(state.snapshot()), rx))
    }
}
