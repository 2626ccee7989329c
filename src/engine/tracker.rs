//! The tracker: the only write path into the store.
//!
//! Two mutations exist. [`Tracker::create_assignment`] expands the branch
//! selection and materializes one pending record per branch, all or
//! nothing. [`Tracker::set_status`] moves one record through the
//! pending/completed state machine and returns the new state only after
//! the store acknowledged it. [`Tracker::follow_up`] counts a reminder on a
//! pending record without touching its status.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::aggregate::{DashboardStats, ProgressSummary};
use crate::directory::BranchDirectory;
use crate::error::{Error, Result};
use crate::fanout;
use crate::model::*;
use crate::notify::{Dispatch, Notifier};
use crate::store::{Snapshot, Store, Subscription};
use crate::telemetry::metrics;
use crate::telemetry::tracking::{record_fanout, start_creation_span, start_transition_span};

/// How a record update is counted. A status change is a transition; a
/// remarks edit or a follow-up leaves the status alone and is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Transition {
        from: ProgressStatus,
        to: ProgressStatus,
    },
    Remarks,
    FollowUp,
}

impl WriteKind {
    /// `None` when the request changes nothing.
    fn of(from: ProgressStatus, to: ProgressStatus, moved: bool, annotated: bool) -> Option<Self> {
        match (moved, annotated) {
            (true, _) => Some(WriteKind::Transition { from, to }),
            (false, true) => Some(WriteKind::Remarks),
            (false, false) => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            WriteKind::Transition { .. } => "transition",
            WriteKind::Remarks => "remarks",
            WriteKind::FollowUp => "follow_up",
        }
    }
}

/// What a successful creation produced.
#[derive(Debug)]
pub struct Created {
    pub assignment: Assignment,
    /// One pending record per resolved branch, in expansion order.
    pub records: Vec<ProgressRecord>,
    /// Selected identifiers that matched no branch and were dropped.
    pub discarded: Vec<BranchCode>,
    /// Recipients handed to the notifier.
    pub dispatch: Dispatch,
    /// False if the notifier reported an error. The assignment still stands.
    pub notified: bool,
}

/// An assignment with its records and derived progress.
#[derive(Debug, Clone)]
pub struct AssignmentDetail {
    pub assignment: Assignment,
    pub records: Vec<ProgressRecord>,
    pub summary: ProgressSummary,
}

impl AssignmentDetail {
    pub fn overall_status(&self) -> OverallStatus {
        self.summary.overall_status()
    }
}

#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn Store>,
    directory: Arc<BranchDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl Tracker {
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<BranchDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            directory,
            notifier,
        }
    }

    pub fn directory(&self) -> &BranchDirectory {
        &self.directory
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an assignment and fan it out to its branches.
    ///
    /// Unresolved identifiers are dropped and reported in
    /// [`Created::discarded`]. If nothing resolves, fails with
    /// [`Error::InvalidSelection`] before any write. If the progress
    /// records cannot be written, the assignment is removed again and the
    /// call fails with [`Error::PartialFanOut`].
    pub async fn create_assignment(&self, new: NewAssignment) -> Result<Created> {
        let span = start_creation_span(&new.title);
        self.create_in_span(new).instrument(span).await
    }

    async fn create_in_span(&self, new: NewAssignment) -> Result<Created> {
        let priority_label = KeyValue::new("priority", new.priority.to_string());
        let expansion = fanout::expand(&new.branches, &self.directory);

        if !expansion.discarded.is_empty() {
            warn!(
                discarded = expansion.discarded.len(),
                codes = ?expansion.discarded,
                "unresolved branch codes dropped from selection"
            );
            metrics::fanout_discards().add(expansion.discarded.len() as u64, &[]);
        }

        if expansion.is_empty() {
            metrics::assignments_created()
                .add(1, &[priority_label, KeyValue::new("result", "rejected")]);
            return Err(Error::InvalidSelection {
                discarded: expansion.discarded.len(),
            });
        }

        let now = Utc::now();
        let mut assignment = Assignment {
            id: AssignmentId::new(),
            title: new.title,
            description: new.description,
            deadline: new.deadline,
            priority: new.priority,
            category: new.category,
            branch_selector: fanout::normalize_selection(&expansion, &self.directory),
            project_id: new.project_id,
            created_by: new.created_by,
            created_at: now,
            emails_sent: false,
        };
        let records: Vec<ProgressRecord> = expansion
            .codes
            .iter()
            .map(|code| ProgressRecord::pending(assignment.id, code.clone(), now))
            .collect();

        record_fanout(
            &Span::current(),
            assignment.id,
            records.len(),
            expansion.discarded.len(),
        );

        self.timed("insert_assignment", self.store.insert_assignment(&assignment))
            .await?;

        if let Err(e) = self
            .timed("insert_progress", self.store.insert_progress(&records))
            .await
        {
            error!(id = %assignment.id, error = %e, "fan-out failed, removing assignment");
            if let Err(cleanup) = self.store.delete_assignment(assignment.id).await {
                error!(
                    id = %assignment.id,
                    error = %cleanup,
                    "compensating delete failed; assignment left without records"
                );
            }
            metrics::assignments_created()
                .add(1, &[priority_label, KeyValue::new("result", "partial_fanout")]);
            return Err(Error::PartialFanOut {
                assignment_id: assignment.id,
                expected: records.len(),
                source: Box::new(e),
            });
        }

        metrics::assignments_created().add(1, &[priority_label, KeyValue::new("result", "ok")]);
        metrics::progress_records_created().add(records.len() as u64, &[]);
        info!(
            id = %assignment.id,
            records = records.len(),
            selector = if assignment.branch_selector.is_all() { "ALL" } else { "explicit" },
            "assignment created"
        );

        let dispatch = Dispatch {
            assignment_id: assignment.id,
            title: assignment.title.clone(),
            deadline: assignment.deadline,
            recipients: fanout::recipients(&expansion.codes, &self.directory),
        };
        let notified = match self.notifier.notify(&dispatch).await {
            Ok(()) => {
                metrics::notifications().add(1, &[KeyValue::new("result", "ok")]);
                match self.store.mark_emails_sent(assignment.id).await {
                    Ok(()) => assignment.emails_sent = true,
                    Err(e) => warn!(
                        id = %assignment.id,
                        error = %e,
                        "notification sent but not recorded"
                    ),
                }
                true
            }
            Err(e) => {
                warn!(id = %assignment.id, error = %e, "notification failed");
                metrics::notifications().add(1, &[KeyValue::new("result", "error")]);
                false
            }
        };

        Ok(Created {
            assignment,
            records,
            discarded: expansion.discarded,
            dispatch,
            notified,
        })
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Move a progress record to `to`, optionally replacing its remarks.
    ///
    /// A request that changes nothing returns the current record without
    /// writing. A failed write surfaces as [`Error::TransitionWrite`] and
    /// no updated record is returned.
    pub async fn set_status(
        &self,
        id: ProgressId,
        to: ProgressStatus,
        remarks: Option<String>,
    ) -> Result<ProgressRecord> {
        let current = self.store.get_progress(id).await?;
        let from = current.status();
        let now = Utc::now();

        let mut next = current.clone();
        let moved = next.transition(to, now);
        let annotated = remarks.is_some_and(|r| next.annotate(r, now));

        let Some(kind) = WriteKind::of(from, to, moved, annotated) else {
            debug!(%id, status = %from, "status unchanged, nothing to write");
            return Ok(current);
        };

        if matches!(kind, WriteKind::Remarks) {
            self.persist(&next, kind).await?;
            debug!(%id, "remarks updated");
            return Ok(next);
        }

        let span = start_transition_span(id, from, to);
        async {
            self.persist(&next, kind).await?;
            info!(%id, %from, %to, "progress updated");
            Ok(next)
        }
        .instrument(span)
        .await
    }

    /// Count a reminder sent to a branch whose record is still pending.
    ///
    /// Fails with [`Error::AlreadyCompleted`] for completed records.
    pub async fn follow_up(&self, id: ProgressId) -> Result<ProgressRecord> {
        let mut record = self.store.get_progress(id).await?;
        record.follow_up(Utc::now())?;
        self.persist(&record, WriteKind::FollowUp).await?;
        info!(%id, follow_ups = record.follow_ups(), "follow-up recorded");
        Ok(record)
    }

    /// Write one record update and count it under `kind`. Status changes are
    /// counted as transitions; everything else as a plain update.
    async fn persist(&self, record: &ProgressRecord, kind: WriteKind) -> Result<()> {
        let written = self
            .timed("update_progress", self.store.update_progress(record))
            .await;
        let result = KeyValue::new("result", if written.is_ok() { "ok" } else { "write_failed" });
        match kind {
            WriteKind::Transition { from, to } => metrics::progress_transitions().add(
                1,
                &[
                    KeyValue::new("from", from.to_string()),
                    KeyValue::new("to", to.to_string()),
                    result,
                ],
            ),
            WriteKind::Remarks | WriteKind::FollowUp => metrics::progress_updates()
                .add(1, &[KeyValue::new("kind", kind.label()), result]),
        }
        written.map_err(|e| {
            error!(id = %record.id, error = %e, "progress update not persisted");
            Error::TransitionWrite {
                id: record.id,
                source: Box::new(e),
            }
        })
    }

    /// Mark a record completed, stamping today's completion date.
    pub async fn complete(&self, id: ProgressId, remarks: Option<String>) -> Result<ProgressRecord> {
        self.set_status(id, ProgressStatus::Completed, remarks).await
    }

    /// Undo a completion.
    pub async fn reopen(&self, id: ProgressId) -> Result<ProgressRecord> {
        self.set_status(id, ProgressStatus::Pending, None).await
    }

    /// Flip a record between pending and completed.
    pub async fn toggle(&self, id: ProgressId) -> Result<ProgressRecord> {
        let current = self.store.get_progress(id).await?;
        self.set_status(id, current.status().toggled(), None).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn assignment(&self, id: AssignmentId) -> Result<AssignmentDetail> {
        let assignment = self.store.get_assignment(id).await?;
        let records = self.store.progress_for(id).await?;
        let summary = ProgressSummary {
            completed: records.iter().filter(|r| r.is_completed()).count(),
            total: records.len(),
        };
        Ok(AssignmentDetail {
            assignment,
            records,
            summary,
        })
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.timed("snapshot", self.store.snapshot()).await
    }

    /// One-shot statistics, recomputed from a fresh snapshot.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<DashboardStats> {
        let snapshot = self.snapshot().await?;
        Ok(DashboardStats::from_snapshot(&snapshot, now))
    }

    pub async fn subscribe(&self) -> Result<Subscription> {
        self.store.subscribe().await
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = fut.await;
        metrics::store_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", operation)],
        );
        result
    }
}
