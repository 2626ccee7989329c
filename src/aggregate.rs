//! Dashboard statistics derived from the live record set.
//!
//! [`DashboardStats::from_snapshot`] recomputes everything from a snapshot.
//! [`Aggregator`] keeps running counters and applies each [`Change`] in
//! time proportional to the records it touches, falling back to a full
//! rebuild only when a subscriber lagged.
//!
//! "Today" is the server's local calendar day.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::Serialize;

use crate::event::Change;
use crate::model::{Assignment, AssignmentId, OverallStatus, ProgressId, ProgressRecord};
use crate::store::Snapshot;

/// Window for [`DashboardStats::due_this_week`].
pub const DUE_SOON_WINDOW_DAYS: i64 = 7;

/// Completed / total progress records of one assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub total: usize,
}

impl ProgressSummary {
    /// Completion ratio in `[0, 1]`. Zero when there are no records.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn pending(&self) -> usize {
        self.total - self.completed
    }

    pub fn overall_status(&self) -> OverallStatus {
        OverallStatus::from_counts(self.completed, self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Records completed on the current local day.
    pub today_completed: usize,
    /// Pending records across all assignments.
    pub total_pending: usize,
    /// Assignments past their deadline and not completed.
    pub overdue_assignments: usize,
    pub total_assignments: usize,
    pub completed_assignments: usize,
    /// Not completed, deadline within the next [`DUE_SOON_WINDOW_DAYS`] days.
    pub due_this_week: usize,
}

impl DashboardStats {
    /// Full recomputation over a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        let today = local_day(now);
        let summaries = summarize(snapshot);

        let mut stats = DashboardStats {
            total_assignments: snapshot.assignments.len(),
            ..Default::default()
        };
        for record in &snapshot.progress {
            match record.completion_date() {
                Some(done) if local_day(done) == today => stats.today_completed += 1,
                Some(_) => {}
                None => stats.total_pending += 1,
            }
        }
        for assignment in &snapshot.assignments {
            let status = summaries
                .get(&assignment.id)
                .copied()
                .unwrap_or_default()
                .overall_status();
            stats.count_assignment(assignment.deadline, status, now);
        }
        stats
    }

    fn count_assignment(
        &mut self,
        deadline: Option<DateTime<Utc>>,
        status: OverallStatus,
        now: DateTime<Utc>,
    ) {
        if status == OverallStatus::Completed {
            self.completed_assignments += 1;
            return;
        }
        if let Some(deadline) = deadline {
            if deadline < now {
                self.overdue_assignments += 1;
            } else if deadline <= now + Duration::days(DUE_SOON_WINDOW_DAYS) {
                self.due_this_week += 1;
            }
        }
    }
}

/// Per-assignment progress for every assignment in a snapshot.
///
/// Records whose assignment is absent from the snapshot are ignored.
pub fn summarize(snapshot: &Snapshot) -> HashMap<AssignmentId, ProgressSummary> {
    let mut out: HashMap<AssignmentId, ProgressSummary> = snapshot
        .assignments
        .iter()
        .map(|a| (a.id, ProgressSummary::default()))
        .collect();
    for record in &snapshot.progress {
        if let Some(summary) = out.get_mut(&record.assignment_id) {
            summary.total += 1;
            if record.is_completed() {
                summary.completed += 1;
            }
        }
    }
    out
}

fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

// ---------------------------------------------------------------------------
// Incremental aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AssignmentEntry {
    /// False until the assignment itself has been seen. Records can arrive
    /// first when a subscriber joins mid-stream.
    known: bool,
    deadline: Option<DateTime<Utc>>,
    summary: ProgressSummary,
    records: HashSet<ProgressId>,
}

/// The part of a record the counters depend on.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    assignment_id: AssignmentId,
    completed_on: Option<NaiveDate>,
}

impl From<&ProgressRecord> for Contribution {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            assignment_id: record.assignment_id,
            completed_on: record.completion_date().map(local_day),
        }
    }
}

/// Running counters over the live collections.
#[derive(Debug, Default)]
pub struct Aggregator {
    assignments: HashMap<AssignmentId, AssignmentEntry>,
    records: HashMap<ProgressId, Contribution>,
    pending: usize,
    completions_by_day: BTreeMap<NaiveDate, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut agg = Self::new();
        agg.rebuild(snapshot);
        agg
    }

    /// Discard all counters and recompute from `snapshot`.
    pub fn rebuild(&mut self, snapshot: &Snapshot) {
        *self = Self::default();
        for assignment in &snapshot.assignments {
            self.upsert_assignment(assignment);
        }
        for record in &snapshot.progress {
            self.upsert_record(record);
        }
    }

    pub fn apply(&mut self, change: &Change) {
        match change {
            Change::AssignmentCreated { assignment } | Change::AssignmentUpdated { assignment } => {
                self.upsert_assignment(assignment)
            }
            Change::ProgressCreated { record } | Change::ProgressUpdated { record } => {
                self.upsert_record(record)
            }
            Change::AssignmentRemoved { id } => self.remove_assignment(*id),
        }
    }

    pub fn apply_all<'a>(&mut self, changes: impl IntoIterator<Item = &'a Change>) {
        for change in changes {
            self.apply(change);
        }
    }

    fn upsert_assignment(&mut self, assignment: &Assignment) {
        let entry = self.assignments.entry(assignment.id).or_default();
        entry.known = true;
        entry.deadline = assignment.deadline;
    }

    fn upsert_record(&mut self, record: &ProgressRecord) {
        if let Some(old) = self.records.remove(&record.id) {
            self.retract(record.id, old);
        }
        let new = Contribution::from(record);
        let entry = self.assignments.entry(new.assignment_id).or_default();
        entry.summary.total += 1;
        entry.records.insert(record.id);
        match new.completed_on {
            Some(day) => {
                entry.summary.completed += 1;
                *self.completions_by_day.entry(day).or_default() += 1;
            }
            None => self.pending += 1,
        }
        self.records.insert(record.id, new);
    }

    fn retract(&mut self, id: ProgressId, old: Contribution) {
        if let Some(entry) = self.assignments.get_mut(&old.assignment_id) {
            entry.summary.total -= 1;
            entry.records.remove(&id);
            if old.completed_on.is_some() {
                entry.summary.completed -= 1;
            }
        }
        self.uncount(old.completed_on);
    }

    /// Undo a record's contribution to the global counters.
    fn uncount(&mut self, completed_on: Option<NaiveDate>) {
        match completed_on {
            Some(day) => {
                if let Some(count) = self.completions_by_day.get_mut(&day) {
                    *count -= 1;
                    if *count == 0 {
                        self.completions_by_day.remove(&day);
                    }
                }
            }
            None => self.pending -= 1,
        }
    }

    fn remove_assignment(&mut self, id: AssignmentId) {
        let Some(entry) = self.assignments.remove(&id) else {
            return;
        };
        for record_id in entry.records {
            if let Some(old) = self.records.remove(&record_id) {
                self.uncount(old.completed_on);
            }
        }
    }

    /// Progress of one assignment. Zero records (or unknown id) is 0.0.
    pub fn progress(&self, id: AssignmentId) -> f64 {
        self.summary(id).ratio()
    }

    pub fn summary(&self, id: AssignmentId) -> ProgressSummary {
        self.assignments
            .get(&id)
            .map(|e| e.summary)
            .unwrap_or_default()
    }

    pub fn total_pending(&self) -> usize {
        self.pending
    }

    /// Records completed on the local calendar day containing `now`.
    pub fn completed_on_day_of(&self, now: DateTime<Utc>) -> usize {
        self.completions_by_day
            .get(&local_day(now))
            .copied()
            .unwrap_or(0)
    }

    /// Current statistics. Counters are O(1); overdue and due-soon scan
    /// the assignments since they depend on `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> DashboardStats {
        let mut stats = DashboardStats {
            today_completed: self.completed_on_day_of(now),
            total_pending: self.pending,
            ..Default::default()
        };
        for entry in self.assignments.values().filter(|e| e.known) {
            stats.total_assignments += 1;
            stats.count_assignment(entry.deadline, entry.summary.overall_status(), now);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchCode, BranchSelector, Priority, ProgressStatus};

    fn assignment(deadline: Option<DateTime<Utc>>) -> Assignment {
        Assignment {
            id: AssignmentId::new(),
            title: "Stock count".into(),
            description: None,
            deadline,
            priority: Priority::High,
            category: None,
            branch_selector: BranchSelector::All,
            project_id: None,
            created_by: None,
            created_at: Utc::now(),
            emails_sent: false,
        }
    }

    fn records(a: &Assignment, codes: &[&str]) -> Vec<ProgressRecord> {
        codes
            .iter()
            .map(|c| ProgressRecord::pending(a.id, BranchCode::from(*c), Utc::now()))
            .collect()
    }

    #[test]
    fn zero_records_is_zero_progress() {
        let summary = ProgressSummary::default();
        assert_eq!(summary.ratio(), 0.0);
        assert_eq!(Aggregator::new().progress(AssignmentId::new()), 0.0);
    }

    #[test]
    fn overdue_counts_only_unfinished_past_deadline() {
        let now = Utc::now();
        let a = assignment(Some(now - Duration::days(1)));
        let mut recs = records(&a, &["A"]);
        let mut snapshot = Snapshot {
            assignments: vec![a.clone()],
            progress: recs.clone(),
        };
        assert_eq!(DashboardStats::from_snapshot(&snapshot, now).overdue_assignments, 1);

        recs[0].transition(ProgressStatus::Completed, now);
        snapshot.progress = recs;
        let stats = DashboardStats::from_snapshot(&snapshot, now);
        assert_eq!(stats.overdue_assignments, 0);
        assert_eq!(stats.completed_assignments, 1);
    }

    #[test]
    fn assignment_without_records_is_not_completed() {
        let now = Utc::now();
        let a = assignment(Some(now - Duration::hours(1)));
        let snapshot = Snapshot {
            assignments: vec![a],
            progress: vec![],
        };
        assert_eq!(DashboardStats::from_snapshot(&snapshot, now).overdue_assignments, 1);
    }

    #[test]
    fn due_this_week_excludes_overdue_and_distant() {
        let now = Utc::now();
        let snapshot = Snapshot {
            assignments: vec![
                assignment(Some(now + Duration::days(2))),
                assignment(Some(now + Duration::days(30))),
                assignment(Some(now - Duration::days(2))),
                assignment(None),
            ],
            progress: vec![],
        };
        let stats = DashboardStats::from_snapshot(&snapshot, now);
        assert_eq!(stats.due_this_week, 1);
        assert_eq!(stats.overdue_assignments, 1);
        assert_eq!(stats.total_assignments, 4);
    }

    #[test]
    fn completion_on_earlier_day_is_not_today() {
        let now = Utc::now();
        let a = assignment(None);
        let mut recs = records(&a, &["A", "B"]);
        recs[0].transition(ProgressStatus::Completed, now - Duration::days(3));
        let snapshot = Snapshot {
            assignments: vec![a],
            progress: recs,
        };
        let stats = DashboardStats::from_snapshot(&snapshot, now);
        assert_eq!(stats.today_completed, 0);
        assert_eq!(stats.total_pending, 1);
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let now = Utc::now();
        let a = assignment(Some(now - Duration::days(1)));
        let b = assignment(Some(now + Duration::days(3)));
        let mut recs_a = records(&a, &["A", "B", "C"]);
        let recs_b = records(&b, &["A"]);

        let mut agg = Aggregator::new();
        agg.apply(&Change::AssignmentCreated { assignment: a.clone() });
        agg.apply(&Change::AssignmentCreated { assignment: b.clone() });
        for record in recs_a.iter().chain(&recs_b) {
            agg.apply(&Change::ProgressCreated { record: record.clone() });
        }

        recs_a[1].transition(ProgressStatus::Completed, now);
        agg.apply(&Change::ProgressUpdated { record: recs_a[1].clone() });

        let snapshot = Snapshot {
            assignments: vec![b.clone(), a.clone()],
            progress: recs_a.iter().chain(&recs_b).cloned().collect(),
        };
        assert_eq!(agg.stats(now), DashboardStats::from_snapshot(&snapshot, now));
        assert_eq!(agg.summary(a.id), ProgressSummary { completed: 1, total: 3 });
        assert!((agg.progress(a.id) - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn repeated_update_is_counted_once() {
        let now = Utc::now();
        let a = assignment(None);
        let mut rec = records(&a, &["A"]).remove(0);
        let mut agg = Aggregator::new();
        agg.apply(&Change::AssignmentCreated { assignment: a.clone() });
        agg.apply(&Change::ProgressCreated { record: rec.clone() });

        rec.transition(ProgressStatus::Completed, now);
        agg.apply(&Change::ProgressUpdated { record: rec.clone() });
        agg.apply(&Change::ProgressUpdated { record: rec.clone() });
        assert_eq!(agg.completed_on_day_of(now), 1);
        assert_eq!(agg.total_pending(), 0);

        rec.transition(ProgressStatus::Pending, now);
        agg.apply(&Change::ProgressUpdated { record: rec });
        assert_eq!(agg.completed_on_day_of(now), 0);
        assert_eq!(agg.total_pending(), 1);
    }

    #[test]
    fn removing_assignment_drops_its_records() {
        let now = Utc::now();
        let a = assignment(None);
        let mut recs = records(&a, &["A", "B"]);
        recs[0].transition(ProgressStatus::Completed, now);
        let mut agg = Aggregator::from_snapshot(&Snapshot {
            assignments: vec![a.clone()],
            progress: recs,
        });
        assert_eq!(agg.stats(now).today_completed, 1);

        agg.apply(&Change::AssignmentRemoved { id: a.id });
        assert_eq!(agg.stats(now), DashboardStats::default());
    }
}
