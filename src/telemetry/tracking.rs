//! Span helpers for the two write paths.

use tracing::Span;

use crate::model::{AssignmentId, ProgressId, ProgressStatus};

/// Span covering one assignment creation, from expansion to notification.
///
/// `assignment.id` and `fanout.records` are filled in once known.
pub fn start_creation_span(title: &str) -> Span {
    tracing::info_span!(
        "assignment.create",
        "assignment.title" = title,
        "assignment.id" = tracing::field::Empty,
        "fanout.records" = tracing::field::Empty,
        "fanout.discarded" = tracing::field::Empty,
    )
}

/// Record the fan-out result on a creation span.
pub fn record_fanout(span: &Span, id: AssignmentId, records: usize, discarded: usize) {
    span.record("assignment.id", tracing::field::display(id));
    span.record("fanout.records", records);
    span.record("fanout.discarded", discarded);
}

/// Span covering one progress status change.
pub fn start_transition_span(id: ProgressId, from: ProgressStatus, to: ProgressStatus) -> Span {
    tracing::info_span!(
        "progress.transition",
        "progress.id" = %id,
        "progress.from" = %from,
        "progress.to" = %to,
    )
}
