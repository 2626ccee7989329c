//! Integration tests for telemetry initialization and span helpers.

use branchtrack::model::{AssignmentId, ProgressId, ProgressStatus};
use branchtrack::telemetry::tracking;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init returns Err instead of panicking.
    let config = branchtrack::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "branchtrack-test".to_string(),
        log_level: "debug".to_string(),
    };
    if let Ok(guard) = branchtrack::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn creation_span_records_fanout() {
    let span = tracking::start_creation_span("quarterly audit");
    tracking::record_fanout(&span, AssignmentId::new(), 3, 1);
}

#[test]
fn transition_span_creates() {
    let _span = tracking::start_transition_span(
        ProgressId::new(),
        ProgressStatus::Pending,
        ProgressStatus::Completed,
    );
}
