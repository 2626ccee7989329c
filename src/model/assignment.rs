//! Assignments: units of work distributed to one or more branches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BranchCode;
use crate::error::Error;

/// A unit of work targeted at a set of branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: Option<String>,
    /// Which branches this assignment fans out to. Stored normalized:
    /// an explicit selection covering every branch is stored as `All`.
    pub branch_selector: BranchSelector,
    /// Free-form grouping key (e.g. a project).
    pub project_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once the notifier accepted the creation dispatch.
    #[serde(default)]
    pub emails_sent: bool,
}

impl Assignment {
    /// Deadline strictly in the past relative to `now`.
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| d < now)
    }
}

/// Newtype for assignment IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 chars of the UUID, for tables.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(Error::Other(format!("unknown priority: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch selector
// ---------------------------------------------------------------------------

/// The literal `"ALL"` or an explicit list of branch codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectorRepr", into = "SelectorRepr")]
pub enum BranchSelector {
    All,
    Codes(Vec<BranchCode>),
}

impl BranchSelector {
    pub const ALL_LITERAL: &'static str = "ALL";

    pub fn is_all(&self) -> bool {
        matches!(self, BranchSelector::All)
    }
}

impl std::str::FromStr for BranchSelector {
    type Err = Error;

    /// Parses `ALL` or a comma-separated list of codes. Bare integers
    /// become numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == Self::ALL_LITERAL {
            return Ok(BranchSelector::All);
        }
        let codes: Vec<BranchCode> = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<i64>() {
                Ok(n) => BranchCode::Numeric(n),
                Err(_) => BranchCode::Text(part.to_string()),
            })
            .collect();
        if codes.is_empty() {
            return Err(Error::Other("empty branch selection".to_string()));
        }
        Ok(BranchSelector::Codes(codes))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    Literal(String),
    Codes(Vec<BranchCode>),
}

impl TryFrom<SelectorRepr> for BranchSelector {
    type Error = String;

    fn try_from(repr: SelectorRepr) -> Result<Self, Self::Error> {
        match repr {
            SelectorRepr::Literal(s) if s == BranchSelector::ALL_LITERAL => Ok(BranchSelector::All),
            SelectorRepr::Literal(s) => Err(format!("expected \"ALL\" or a list of codes, got {s:?}")),
            SelectorRepr::Codes(codes) => Ok(BranchSelector::Codes(codes)),
        }
    }
}

impl From<BranchSelector> for SelectorRepr {
    fn from(selector: BranchSelector) -> Self {
        match selector {
            BranchSelector::All => SelectorRepr::Literal(BranchSelector::ALL_LITERAL.to_string()),
            BranchSelector::Codes(codes) => SelectorRepr::Codes(codes),
        }
    }
}

// ---------------------------------------------------------------------------
// Overall status
// ---------------------------------------------------------------------------

/// Assignment-level status. Always derived from progress record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    InProgress,
    Completed,
}

impl OverallStatus {
    pub fn from_counts(completed: usize, total: usize) -> Self {
        if total > 0 && completed >= total {
            OverallStatus::Completed
        } else if completed > 0 {
            OverallStatus::InProgress
        } else {
            OverallStatus::Pending
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OverallStatus::Pending => "pending",
            OverallStatus::InProgress => "in_progress",
            OverallStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OverallStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OverallStatus::Pending),
            "in_progress" | "in-progress" => Ok(OverallStatus::InProgress),
            "completed" => Ok(OverallStatus::Completed),
            _ => Err(Error::Other(format!("unknown status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for new assignments. Passed to [`crate::engine::Tracker::create_assignment`].
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) deadline: Option<DateTime<Utc>>,
    pub(crate) priority: Priority,
    pub(crate) category: Option<String>,
    pub(crate) branches: BranchSelector,
    pub(crate) project_id: Option<String>,
    pub(crate) created_by: Option<String>,
}

impl NewAssignment {
    pub fn new(title: impl Into<String>, branches: BranchSelector) -> Self {
        Self {
            title: title.into(),
            description: None,
            deadline: None,
            priority: Priority::Normal,
            category: None,
            branches,
            project_id: None,
            created_by: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.created_by = Some(who.into());
        self
    }
}
