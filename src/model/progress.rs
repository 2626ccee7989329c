//! Per-branch progress records and their status state machine.
//!
//! Two authoritative states, fully reversible. Completion date travels
//! with the status: `Completed` iff `completion_date` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AssignmentId, BranchCode};
use crate::error::Error;

/// Tracking state of one assignment at one branch.
///
/// Not `Deserialize`: records are only rebuilt through [`ProgressRecord::from_stored`],
/// which checks the completion invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub id: ProgressId,
    pub assignment_id: AssignmentId,
    /// Canonical directory code of the branch.
    pub branch_code: BranchCode,
    status: ProgressStatus,
    completion_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    /// Reminders sent while the record was pending.
    follow_ups: u32,
    last_follow_up: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Last write stamp. The store applies last-write-wins per record.
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// A fresh pending record, as created by fan-out.
    pub fn pending(assignment_id: AssignmentId, branch_code: BranchCode, now: DateTime<Utc>) -> Self {
        Self {
            id: ProgressId::new(),
            assignment_id,
            branch_code,
            status: ProgressStatus::Pending,
            completion_date: None,
            remarks: None,
            follow_ups: 0,
            last_follow_up: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from persisted fields, rejecting rows that break
    /// the completion invariant.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: ProgressId,
        assignment_id: AssignmentId,
        branch_code: BranchCode,
        status: ProgressStatus,
        completion_date: Option<DateTime<Utc>>,
        remarks: Option<String>,
        follow_ups: u32,
        last_follow_up: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if (status == ProgressStatus::Completed) != completion_date.is_some() {
            return Err(Error::Other(format!(
                "progress record {id} is {status} but completion date is {}",
                if completion_date.is_some() { "set" } else { "missing" }
            )));
        }
        Ok(Self {
            id,
            assignment_id,
            branch_code,
            status,
            completion_date,
            remarks,
            follow_ups,
            last_follow_up,
            created_at,
            updated_at,
        })
    }

    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    pub fn follow_ups(&self) -> u32 {
        self.follow_ups
    }

    pub fn last_follow_up(&self) -> Option<DateTime<Utc>> {
        self.last_follow_up
    }

    /// Move to `to`. Returns false, touching nothing, if already there.
    pub fn transition(&mut self, to: ProgressStatus, now: DateTime<Utc>) -> bool {
        if self.status == to {
            return false;
        }
        self.completion_date = match to {
            ProgressStatus::Completed => Some(now),
            ProgressStatus::Pending => None,
        };
        self.status = to;
        self.updated_at = now;
        true
    }

    /// Replace the remarks. Returns false if they were already `remarks`.
    pub fn annotate(&mut self, remarks: String, now: DateTime<Utc>) -> bool {
        if self.remarks.as_deref() == Some(remarks.as_str()) {
            return false;
        }
        self.remarks = Some(remarks);
        self.updated_at = now;
        true
    }

    /// Count a reminder to the branch. Refused once the record is completed;
    /// status and completion date are never touched.
    pub fn follow_up(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.is_completed() {
            return Err(Error::AlreadyCompleted(self.id));
        }
        self.follow_ups = self.follow_ups.saturating_add(1);
        self.last_follow_up = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Flip between pending and completed.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.transition(self.status.toggled(), now);
    }
}

/// Newtype for progress record IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressId(pub Uuid);

impl ProgressId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ProgressId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProgressId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    Completed,
}

impl ProgressStatus {
    pub fn toggled(self) -> Self {
        match self {
            ProgressStatus::Pending => ProgressStatus::Completed,
            ProgressStatus::Completed => ProgressStatus::Pending,
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ProgressStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProgressStatus::Pending),
            "completed" => Ok(ProgressStatus::Completed),
            _ => Err(Error::Other(format!("unknown progress status: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> ProgressRecord {
        ProgressRecord::pending(AssignmentId::new(), BranchCode::from("A"), Utc::now())
    }

    fn consistent(r: &ProgressRecord) -> bool {
        r.is_completed() == r.completion_date().is_some()
    }

    #[test]
    fn completing_stamps_completion_date() {
        let mut r = record();
        let now = Utc::now();
        assert!(r.transition(ProgressStatus::Completed, now));
        assert_eq!(r.status(), ProgressStatus::Completed);
        assert_eq!(r.completion_date(), Some(now));
        assert!(consistent(&r));
    }

    #[test]
    fn reopening_clears_completion_date() {
        let mut r = record();
        r.transition(ProgressStatus::Completed, Utc::now());
        assert!(r.transition(ProgressStatus::Pending, Utc::now()));
        assert_eq!(r.completion_date(), None);
        assert!(consistent(&r));
    }

    #[test]
    fn same_state_transition_is_noop() {
        let mut r = record();
        let before = r.clone();
        assert!(!r.transition(ProgressStatus::Pending, Utc::now() + Duration::hours(1)));
        assert_eq!(r, before);
    }

    #[test]
    fn double_toggle_restores_record() {
        let mut r = record();
        let before = r.clone();
        r.toggle(Utc::now());
        assert!(consistent(&r));
        r.toggle(Utc::now());
        assert!(consistent(&r));
        assert_eq!(r.status(), before.status());
        assert_eq!(r.completion_date(), before.completion_date());
        assert_eq!(r.branch_code, before.branch_code);
    }

    #[test]
    fn stored_rows_must_be_consistent() {
        let now = Utc::now();
        let bad = ProgressRecord::from_stored(
            ProgressId::new(),
            AssignmentId::new(),
            BranchCode::from("A"),
            ProgressStatus::Completed,
            None,
            None,
            0,
            None,
            now,
            now,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn follow_up_counts_pending_reminders() {
        let mut r = record();
        let first = Utc::now();
        r.follow_up(first).unwrap();
        let second = first + Duration::hours(2);
        r.follow_up(second).unwrap();
        assert_eq!(r.follow_ups(), 2);
        assert_eq!(r.last_follow_up(), Some(second));
        assert_eq!(r.status(), ProgressStatus::Pending);
        assert!(consistent(&r));
    }

    #[test]
    fn follow_up_on_completed_record_is_refused() {
        let mut r = record();
        r.transition(ProgressStatus::Completed, Utc::now());
        let before = r.clone();
        assert!(matches!(
            r.follow_up(Utc::now() + Duration::hours(1)),
            Err(Error::AlreadyCompleted(id)) if id == before.id
        ));
        assert_eq!(r, before);
        assert!(consistent(&r));
    }

    #[test]
    fn follow_ups_survive_completion_and_reopen() {
        let mut r = record();
        r.follow_up(Utc::now()).unwrap();
        r.transition(ProgressStatus::Completed, Utc::now());
        r.transition(ProgressStatus::Pending, Utc::now());
        assert_eq!(r.follow_ups(), 1);
        assert!(r.last_follow_up().is_some());
        assert_eq!(r.completion_date(), None);
    }
}
