//! Metric instruments.
//!
//! Created on demand from the globally registered `MeterProvider`, so they
//! are no-ops until [`super::init_telemetry`] installs an exporter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Instrumentation scope for all branchtrack signals.
pub const METER_NAME: &str = "branchtrack";

fn meter() -> Meter {
    opentelemetry::global::meter(METER_NAME)
}

/// Counter: assignments created.
/// Labels: `priority`, `result` ("ok" | "rejected" | "partial_fanout").
pub fn assignments_created() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.assignments.created")
        .with_description("Number of assignment creation attempts")
        .build()
}

/// Counter: progress records written by fan-out.
pub fn progress_records_created() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.progress.created")
        .with_description("Number of progress records created by fan-out")
        .build()
}

/// Counter: branch identifiers dropped during fan-out because they did not resolve.
pub fn fanout_discards() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.fanout.discards")
        .with_description("Unresolved branch identifiers dropped during fan-out")
        .build()
}

/// Counter: progress status transitions.
/// Labels: `from`, `to`, `result` ("ok" | "write_failed").
pub fn progress_transitions() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.progress.transitions")
        .with_description("Number of progress record status transitions")
        .build()
}

/// Counter: record writes that leave the status unchanged.
/// Labels: `kind` ("remarks" | "follow_up"), `result` ("ok" | "write_failed").
pub fn progress_updates() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.progress.updates")
        .with_description("Number of progress record updates without a status change")
        .build()
}

/// Counter: notification dispatches.
/// Labels: `result` ("ok" | "error").
pub fn notifications() -> Counter<u64> {
    meter()
        .u64_counter("branchtrack.notifications")
        .with_description("Assignment notifications handed to the notifier")
        .build()
}

/// Histogram: store round-trip duration in milliseconds.
/// Labels: `operation`.
pub fn store_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("branchtrack.store.duration_ms")
        .with_description("Store operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
