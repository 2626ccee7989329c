//! Orchestration: assignment creation with fan-out, progress transitions,
//! and live dashboards over the store's change stream.

pub mod dashboard;
pub mod tracker;

pub use dashboard::Dashboard;
pub use tracker::{AssignmentDetail, Created, Tracker};
