//! Integration tests for telemetry initialization and span helpers.

use recstream::model::partition;

#[test]
fn telemetry_initializes_without_endpoint() {
    // The subscriber can only be set once per process; init may return Err
    // if another test in this binary got there first.
    let config = recstream::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "recstream-test".to_string(),
        log_level: "debug".to_string(),
    };
    if let Ok(guard) = recstream::telemetry::init_telemetry(config) {
        let metrics = guard.metrics();
        metrics.producers.record(4, &[]);
        assert!(metrics.export().is_ok());
    }
}

#[test]
fn pipeline_spans_create_and_record_stage() {
    let span = recstream::telemetry::span::start_run_span(1000, 4, 50);
    recstream::telemetry::span::record_stage(&span, "close_queue");

    for part in partition(1000, 4) {
        let _producer = recstream::telemetry::span::start_producer_span(&part);
    }
    let _consumer = recstream::telemetry::span::start_consumer_span();
    let _monitor = recstream::telemetry::span::start_monitor_span();
}
