//! Notification port.
//!
//! The engine hands one [`Dispatch`] per created assignment to a
//! [`Notifier`]. Delivery, retries and provider integration live behind the
//! trait; the crate ships only [`LogNotifier`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::AssignmentId;

/// Who to tell about a new assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub assignment_id: AssignmentId,
    pub title: String,
    pub deadline: Option<DateTime<Utc>>,
    /// Union of the targeted branches' contact addresses, deduplicated.
    pub recipients: Vec<String>,
}

impl Dispatch {
    pub fn count(&self) -> usize {
        self.recipients.len()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, dispatch: &Dispatch) -> Result<()>;
}

/// Records dispatches in the log instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, dispatch: &Dispatch) -> Result<()> {
        tracing::info!(
            assignment_id = %dispatch.assignment_id,
            title = %dispatch.title,
            recipients = dispatch.count(),
            "assignment notification dispatched"
        );
        Ok(())
    }
}
