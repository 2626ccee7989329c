//! Error types for branchtrack.

use thiserror::Error;

use crate::model::{AssignmentId, BranchCode, ProgressId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// A branch identifier matched no directory entry.
    #[error("unresolved branch code: {0}")]
    Resolution(BranchCode),

    /// The branch selector resolved to zero branches. Nothing was written.
    #[error("branch selection resolved to no branches ({discarded} identifier(s) discarded)")]
    InvalidSelection { discarded: usize },

    /// The assignment was written but its progress records were not.
    #[error("fan-out for assignment {assignment_id} failed ({expected} record(s) expected): {source}")]
    PartialFanOut {
        assignment_id: AssignmentId,
        expected: usize,
        #[source]
        source: Box<Error>,
    },

    /// A status update was not acknowledged by the store.
    #[error("status update for progress record {id} was not persisted: {source}")]
    TransitionWrite {
        id: ProgressId,
        #[source]
        source: Box<Error>,
    },

    /// Follow-ups only apply to pending records.
    #[error("progress record {0} is already completed")]
    AlreadyCompleted(ProgressId),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
