//! Change events delivered to subscribers of the store.
//!
//! Every acknowledged write produces one [`StoreEvent`]: the full snapshot
//! after the write plus the changes that produced it. Snapshot consumers
//! can ignore the changes; incremental consumers apply only the changes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Assignment, AssignmentId, ProgressId, ProgressRecord};
use crate::store::Snapshot;

/// A change notification from the store.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    /// Monotonic per subscription. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Both collections as of this event.
    pub snapshot: Arc<Snapshot>,
    /// What changed since the previous event.
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    AssignmentCreated { assignment: Assignment },
    /// Descriptive fields changed, e.g. the notification flag.
    AssignmentUpdated { assignment: Assignment },
    ProgressCreated { record: ProgressRecord },
    ProgressUpdated { record: ProgressRecord },
    /// The assignment and all of its progress records are gone.
    AssignmentRemoved { id: AssignmentId },
}

impl Change {
    /// Changes that turn `before` into `after`.
    ///
    /// Used by stores that learn about writes only by re-reading, such as
    /// the Postgres listener. Records that vanished with their assignment
    /// are covered by [`Change::AssignmentRemoved`].
    pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<Change> {
        let mut changes = Vec::new();

        for assignment in after.assignments.iter().rev() {
            match before.assignment(assignment.id) {
                None => changes.push(Change::AssignmentCreated {
                    assignment: assignment.clone(),
                }),
                Some(old) if old != assignment => changes.push(Change::AssignmentUpdated {
                    assignment: assignment.clone(),
                }),
                Some(_) => {}
            }
        }

        let previous: HashMap<ProgressId, &ProgressRecord> =
            before.progress.iter().map(|r| (r.id, r)).collect();
        for record in &after.progress {
            match previous.get(&record.id) {
                None => changes.push(Change::ProgressCreated {
                    record: record.clone(),
                }),
                Some(old) if *old != record => changes.push(Change::ProgressUpdated {
                    record: record.clone(),
                }),
                Some(_) => {}
            }
        }

        for assignment in &before.assignments {
            if after.assignment(assignment.id).is_none() {
                changes.push(Change::AssignmentRemoved { id: assignment.id });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchCode, BranchSelector, Priority, ProgressStatus};

    fn assignment() -> Assignment {
        Assignment {
            id: AssignmentId::new(),
            title: "audit".to_string(),
            description: None,
            deadline: None,
            priority: Priority::Normal,
            category: None,
            branch_selector: BranchSelector::All,
            project_id: None,
            created_by: None,
            created_at: Utc::now(),
            emails_sent: false,
        }
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let a = assignment();
        let snap = Snapshot {
            progress: vec![ProgressRecord::pending(a.id, BranchCode::from("A"), Utc::now())],
            assignments: vec![a],
        };
        assert!(Change::diff(&snap, &snap.clone()).is_empty());
    }

    #[test]
    fn diff_reports_notification_flag() {
        let a = assignment();
        let before = Snapshot {
            assignments: vec![a.clone()],
            progress: vec![],
        };
        let mut sent = a;
        sent.emails_sent = true;
        let after = Snapshot {
            assignments: vec![sent],
            progress: vec![],
        };
        let changes = Change::diff(&before, &after);
        assert!(matches!(
            changes.as_slice(),
            [Change::AssignmentUpdated { assignment }] if assignment.emails_sent
        ));
    }

    #[test]
    fn diff_reports_creations_updates_and_removals() {
        let now = Utc::now();
        let kept = assignment();
        let gone = assignment();
        let record = ProgressRecord::pending(kept.id, BranchCode::from("A"), now);
        let before = Snapshot {
            assignments: vec![kept.clone(), gone.clone()],
            progress: vec![
                record.clone(),
                ProgressRecord::pending(gone.id, BranchCode::from("A"), now),
            ],
        };

        let added = assignment();
        let mut done = record.clone();
        done.transition(ProgressStatus::Completed, now);
        let fresh = ProgressRecord::pending(added.id, BranchCode::from("B"), now);
        let after = Snapshot {
            assignments: vec![added.clone(), kept],
            progress: vec![done, fresh.clone()],
        };

        let changes = Change::diff(&before, &after);
        assert_eq!(changes.len(), 4);
        assert!(matches!(&changes[0], Change::AssignmentCreated { assignment } if assignment.id == added.id));
        assert!(matches!(&changes[1], Change::ProgressUpdated { record: r } if r.id == record.id && r.is_completed()));
        assert!(matches!(&changes[2], Change::ProgressCreated { record: r } if r.id == fresh.id));
        assert!(matches!(&changes[3], Change::AssignmentRemoved { id } if *id == gone.id));
    }
}
