//! Core data model.
//!
//! Branches are reference data. An assignment owns one progress record per
//! targeted branch; records point back at their assignment by id only.

pub mod assignment;
pub mod branch;
pub mod progress;

pub use assignment::{Assignment, AssignmentId, BranchSelector, NewAssignment, OverallStatus, Priority};
pub use branch::{Branch, BranchCode};
pub use progress::{ProgressId, ProgressRecord, ProgressStatus};
