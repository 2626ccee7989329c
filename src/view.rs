//! Caller-owned list view over a snapshot: filter and sort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{ProgressSummary, summarize};
use crate::error::Error;
use crate::model::{Assignment, OverallStatus, Priority};
use crate::store::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Earliest deadline first; assignments without one go last.
    Deadline,
    /// Most urgent first.
    Priority,
    /// Newest first.
    #[default]
    Created,
}

impl std::str::FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deadline" => Ok(SortKey::Deadline),
            "priority" => Ok(SortKey::Priority),
            "created" => Ok(SortKey::Created),
            _ => Err(Error::Other(format!("unknown sort key: {s}"))),
        }
    }
}

/// Filter and sort settings. `None` filters match everything.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub status: Option<OverallStatus>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub sort: SortKey,
}

/// One assignment as the list view shows it.
#[derive(Debug, Clone)]
pub struct AssignmentRow {
    pub assignment: Assignment,
    pub summary: ProgressSummary,
    /// Past deadline and not completed.
    pub overdue: bool,
}

impl AssignmentRow {
    pub fn status(&self) -> OverallStatus {
        self.summary.overall_status()
    }
}

impl ViewState {
    pub fn apply(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<AssignmentRow> {
        let summaries = summarize(snapshot);
        let mut rows: Vec<AssignmentRow> = snapshot
            .assignments
            .iter()
            .map(|a| {
                let summary = summaries.get(&a.id).copied().unwrap_or_default();
                AssignmentRow {
                    overdue: a.is_past_deadline(now)
                        && summary.overall_status() != OverallStatus::Completed,
                    assignment: a.clone(),
                    summary,
                }
            })
            .filter(|row| self.matches(row))
            .collect();

        match self.sort {
            SortKey::Deadline => rows.sort_by(|a, b| {
                match (a.assignment.deadline, b.assignment.deadline) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
            }),
            SortKey::Priority => rows.sort_by(|a, b| b.assignment.priority.cmp(&a.assignment.priority)),
            SortKey::Created => rows.sort_by(|a, b| b.assignment.created_at.cmp(&a.assignment.created_at)),
        }
        rows
    }

    fn matches(&self, row: &AssignmentRow) -> bool {
        self.status.is_none_or(|s| row.status() == s)
            && self.priority.is_none_or(|p| row.assignment.priority == p)
            && self
                .category
                .as_deref()
                .is_none_or(|c| row.assignment.category.as_deref() == Some(c))
    }
}
