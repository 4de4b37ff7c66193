//! Metric instruments for recstream.
//!
//! [`Metrics`] is an explicit registry: it is built from an injected
//! `SdkMeterProvider` and handed to the pipeline and the monitor. Nothing here
//! touches the global meter provider.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, MeterProvider as _};
use opentelemetry_sdk::metrics::SdkMeterProvider;

use crate::error::{Error, Result};

const METER_NAME: &str = "recstream";

/// Bucket boundaries for allocated heap bytes: 0, 100 MB, ..., 900 MB.
pub fn allocated_memory_buckets() -> Vec<f64> {
    (0..10).map(|i| f64::from(i) * 100_000_000.0).collect()
}

/// Instruments the pipeline reports to, plus the provider used to push them.
#[derive(Clone)]
pub struct Metrics {
    provider: SdkMeterProvider,

    /// Gauge: unix seconds at which the run started.
    pub start_timestamp: Gauge<f64>,
    /// Gauge: logical CPUs visible to the process.
    pub cpu_count: Gauge<u64>,
    /// Gauge: configured producer count.
    pub producers: Gauge<u64>,
    /// Gauge: records per producer (before remainder).
    pub chunk_size: Gauge<u64>,
    /// Gauge: tasks alive on the runtime when sampled.
    pub live_tasks: Gauge<u64>,
    /// Gauge: live heap bytes when sampled.
    pub heap_bytes: Gauge<u64>,
    /// Gauge: records written to the sink so far.
    pub records_written: Gauge<u64>,
    /// Counter: collection checkpoints run by the monitor.
    pub collections: Counter<u64>,
    /// Counter: records skipped because generation failed.
    pub records_skipped: Counter<u64>,
    /// Histogram: live heap bytes per sample.
    pub allocated_memory: Histogram<f64>,
}

impl Metrics {
    pub fn new(provider: SdkMeterProvider) -> Self {
        let meter = provider.meter(METER_NAME);
        Self::with_meter(provider, &meter)
    }

    /// A registry whose provider has no reader. Values are accepted and dropped.
    pub fn disabled() -> Self {
        Self::new(SdkMeterProvider::builder().build())
    }

    fn with_meter(provider: SdkMeterProvider, meter: &Meter) -> Self {
        Self {
            start_timestamp: meter
                .f64_gauge("recstream.start_timestamp")
                .with_description("Unix time at which the run started")
                .with_unit("s")
                .build(),
            cpu_count: meter
                .u64_gauge("recstream.cpu_count")
                .with_description("Number of logical CPUs")
                .build(),
            producers: meter
                .u64_gauge("recstream.producers")
                .with_description("Number of producer tasks")
                .build(),
            chunk_size: meter
                .u64_gauge("recstream.chunk_size")
                .with_description("Records assigned to each producer")
                .build(),
            live_tasks: meter
                .u64_gauge("recstream.live_tasks")
                .with_description("Tasks alive on the runtime")
                .build(),
            heap_bytes: meter
                .u64_gauge("recstream.heap_bytes")
                .with_description("Live heap bytes")
                .with_unit("By")
                .build(),
            records_written: meter
                .u64_gauge("recstream.records_written")
                .with_description("Records written to the sink")
                .build(),
            collections: meter
                .u64_counter("recstream.collections")
                .with_description("Collection checkpoints run by the monitor")
                .build(),
            records_skipped: meter
                .u64_counter("recstream.records_skipped")
                .with_description("Records skipped after a generation failure")
                .build(),
            allocated_memory: meter
                .f64_histogram("recstream.allocated_memory")
                .with_description("Allocated heap bytes per sample")
                .with_unit("By")
                .with_boundaries(allocated_memory_buckets())
                .build(),
            provider,
        }
    }

    /// Push everything recorded so far to the configured exporters.
    pub fn export(&self) -> Result<()> {
        self.provider
            .force_flush()
            .map_err(|e| Error::Telemetry(format!("failed to export metrics: {e}")))
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
