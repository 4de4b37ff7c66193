//! Pipeline span helpers.
//!
//! One span per run, plus one per producer, consumer and monitor task.

use tracing::Span;

use crate::model::Partition;

/// Start the span covering a whole pipeline run.
///
/// The `pipeline.stage` field is declared empty and updated via
/// [`record_stage`] as the coordinator moves through shutdown.
pub fn start_run_span(num_records: u64, producers: usize, queue_capacity: usize) -> Span {
    tracing::info_span!(
        "pipeline.run",
        "pipeline.records" = num_records,
        "pipeline.producers" = producers,
        "pipeline.queue_capacity" = queue_capacity,
        "pipeline.stage" = tracing::field::Empty,
    )
}

pub fn start_producer_span(partition: &Partition) -> Span {
    tracing::debug_span!(
        "pipeline.producer",
        "producer.id" = partition.producer,
        "producer.start" = partition.start,
        "producer.end" = partition.end,
    )
}

pub fn start_consumer_span() -> Span {
    tracing::info_span!("pipeline.consumer")
}

pub fn start_monitor_span() -> Span {
    tracing::info_span!("pipeline.monitor")
}

/// Record a coordinator stage on the run span and emit an event for it.
pub fn record_stage(span: &Span, stage: &str) {
    span.record("pipeline.stage", stage);
    span.in_scope(|| {
        tracing::debug!(stage = stage, "pipeline_stage");
    });
}
