//! Producer/consumer pipeline and its lifecycle coordinator.
//!
//! [`Pipeline::run`] starts the consumer, the producer pool and the monitor,
//! waits for every producer, closes the queue, stops the monitor and returns
//! once the consumer has drained everything into the sink.
//!
//! Two signals govern shutdown. Producer completion (all tasks joined) closes
//! the queue. A separate abort token lets a failed consumer stop producers
//! early. The monitor has its own cancellation token, fired only by the
//! coordinator.

pub mod consumer;
pub mod producer;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use crate::error::{Error, Result, Stage};
use crate::generator::{EmploymentGenerator, RecordGenerator};
use crate::model::{Partition, partition};
use crate::monitor::{Monitor, MonitorConfig, MonitorReport};
use crate::queue::WorkQueue;
use crate::sink::{RecordSink, Sink, SinkConfig};
use crate::telemetry::metrics::Metrics;
use crate::telemetry::span::{
    record_stage, start_consumer_span, start_producer_span, start_run_span,
};

use self::consumer::consume;
use self::producer::{ProducerStats, produce};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Upper bound on producer tasks, explicit or derived from the CPU count.
pub const MAX_PRODUCERS: usize = 65_536;

/// Sizing of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Total records to generate.
    pub num_records: u64,
    /// Producers per logical CPU when `producers` is not set.
    pub parallelism_factor: usize,
    /// Explicit producer count. Overrides the CPU-derived default.
    pub producers: Option<usize>,
    /// Maximum records buffered between producers and the consumer.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_records: 10_000_000,
            parallelism_factor: 5,
            producers: None,
            queue_capacity: 100_000,
        }
    }
}

impl PipelineConfig {
    /// Number of producer tasks this config spawns.
    ///
    /// Saturates instead of overflowing; [`validate`](Self::validate) rejects
    /// anything above [`MAX_PRODUCERS`].
    pub fn producer_count(&self) -> usize {
        self.producers
            .unwrap_or_else(|| num_cpus::get().saturating_mul(self.parallelism_factor))
    }

    /// Records per producer before the last one takes the remainder.
    pub fn chunk_size(&self) -> u64 {
        self.num_records / self.producer_count().max(1) as u64
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism_factor == 0 {
            return Err(Error::Config(
                "parallelism factor must be at least 1".to_string(),
            ));
        }
        if self.producers == Some(0) {
            return Err(Error::Config("producer count must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".to_string()));
        }

        let count = match self.producers {
            Some(n) => n,
            None => num_cpus::get()
                .checked_mul(self.parallelism_factor)
                .ok_or_else(|| {
                    Error::Config(format!(
                        "parallelism factor {} overflows the producer count",
                        self.parallelism_factor
                    ))
                })?,
        };
        if count > MAX_PRODUCERS {
            return Err(Error::Config(format!(
                "producer count {count} exceeds the limit of {MAX_PRODUCERS}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Live counters shared by producers, the consumer and the monitor.
#[derive(Debug, Default)]
pub struct Progress {
    produced: AtomicU64,
    skipped: AtomicU64,
    written: AtomicU64,
}

impl Progress {
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub(crate) fn record_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub num_records: u64,
    pub producers: usize,
    pub chunk_size: u64,
    pub partitions: Vec<Partition>,
    pub produced: u64,
    pub skipped: u64,
    pub written: u64,
    /// Highest number of records observed in the queue at once.
    pub queue_peak: usize,
    pub elapsed: Duration,
    pub monitor: MonitorReport,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// One pipeline, parameterized by its generator. Sinks are passed per run.
pub struct Pipeline<G = EmploymentGenerator> {
    config: PipelineConfig,
    monitor: MonitorConfig,
    metrics: Metrics,
    generator: Arc<G>,
}

impl Pipeline<EmploymentGenerator> {
    pub fn new(config: PipelineConfig, monitor: MonitorConfig, metrics: Metrics) -> Self {
        Self {
            config,
            monitor,
            metrics,
            generator: Arc::new(EmploymentGenerator::new()),
        }
    }
}

impl<G: RecordGenerator> Pipeline<G> {
    /// Swap the record generator.
    pub fn with_generator<H: RecordGenerator>(self, generator: H) -> Pipeline<H> {
        Pipeline {
            config: self.config,
            monitor: self.monitor,
            metrics: self.metrics,
            generator: Arc::new(generator),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open the sink described by `sink_config`, then run.
    ///
    /// An unavailable sink fails here, before any task is spawned.
    pub async fn run_with_sink_config(
        &self,
        sink_config: &SinkConfig,
    ) -> Result<(RunReport, Sink)> {
        self.config.validate()?;
        let sink = Sink::open(sink_config).await?;
        info!(sink = %sink_config, "sink opened");
        self.run(sink).await
    }

    /// Run the pipeline to completion into `sink`.
    ///
    /// Returns the report and the flushed sink, or the first fatal error.
    /// Records written before a fatal sink error stay in the sink.
    pub async fn run<S: RecordSink>(&self, sink: S) -> Result<(RunReport, S)> {
        self.config.validate()?;
        self.monitor.validate()?;

        let producers = self.config.producer_count();
        let span = start_run_span(
            self.config.num_records,
            producers,
            self.config.queue_capacity,
        );
        self.run_inner(sink, producers).instrument(span).await
    }

    async fn run_inner<S: RecordSink>(&self, sink: S, producers: usize) -> Result<(RunReport, S)> {
        let span = tracing::Span::current();
        let started = Instant::now();
        let partitions = partition(self.config.num_records, producers);
        let chunk_size = self.config.chunk_size();

        self.metrics
            .start_timestamp
            .record(Utc::now().timestamp_millis() as f64 / 1000.0, &[]);
        self.metrics.cpu_count.record(num_cpus::get() as u64, &[]);
        self.metrics.producers.record(producers as u64, &[]);
        self.metrics.chunk_size.record(chunk_size, &[]);

        info!(
            records = self.config.num_records,
            producers,
            chunk_size,
            queue_capacity = self.config.queue_capacity,
            "pipeline starting"
        );

        let (writer, reader) = WorkQueue::bounded(self.config.queue_capacity);
        let progress = Arc::new(Progress::default());
        let abort = CancellationToken::new();

        // 1. Consumer first, so the queue has a reader before anything is sent.
        record_stage(&span, "start_consumer");
        let consumer = tokio::spawn(
            consume(reader, sink, Arc::clone(&progress), abort.clone())
                .instrument(start_consumer_span()),
        );

        // 2. Producer pool.
        record_stage(&span, "start_producers");
        let mut pool = JoinSet::new();
        for part in &partitions {
            pool.spawn(
                produce(
                    *part,
                    Arc::clone(&self.generator),
                    writer.clone(),
                    Arc::clone(&progress),
                    abort.clone(),
                )
                .instrument(start_producer_span(part)),
            );
        }

        // 3. Monitor, on its own token.
        record_stage(&span, "start_monitor");
        let monitor_token = CancellationToken::new();
        let monitor = tokio::spawn(
            Monitor::new(self.monitor, self.metrics.clone(), Arc::clone(&progress))
                .run(monitor_token.clone()),
        );

        // 4. Wait for every producer.
        record_stage(&span, "await_producers");
        let mut totals = ProducerStats::default();
        let mut producer_error = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(stats) => {
                    totals.produced += stats.produced;
                    totals.skipped += stats.skipped;
                }
                Err(e) => {
                    error!("producer task failed: {e}");
                    abort.cancel();
                    producer_error.get_or_insert(Error::Task {
                        stage: Stage::Producer,
                        reason: e.to_string(),
                    });
                }
            }
        }
        if totals.skipped > 0 {
            self.metrics.records_skipped.add(totals.skipped, &[]);
        }

        // 5. No producer can send any more: close the queue.
        record_stage(&span, "close_queue");
        let queue_peak = writer.peak();
        drop(writer);

        // 6. Stop the monitor.
        record_stage(&span, "cancel_monitor");
        monitor_token.cancel();
        let monitor_report = monitor.await.unwrap_or_else(|e| {
            warn!("monitor task failed: {e}");
            MonitorReport::default()
        });

        // 7. Wait for the consumer to drain.
        record_stage(&span, "drain_consumer");
        let consumed = consumer.await.map_err(|e| Error::Task {
            stage: Stage::Consumer,
            reason: e.to_string(),
        });

        // 8. Push final metrics.
        record_stage(&span, "export_metrics");
        self.metrics.records_written.record(progress.written(), &[]);
        if let Err(e) = self.metrics.export() {
            warn!("{e}");
        }

        let sink = match consumed {
            Ok(Ok(sink)) => sink,
            Ok(Err(e)) | Err(e) => {
                error!(stage = %e.stage(), written = progress.written(), "pipeline aborted: {e}");
                return Err(e);
            }
        };
        if let Some(e) = producer_error {
            error!(written = progress.written(), "pipeline aborted: {e}");
            return Err(e);
        }

        let report = RunReport {
            num_records: self.config.num_records,
            producers,
            chunk_size,
            partitions,
            produced: totals.produced,
            skipped: totals.skipped,
            written: progress.written(),
            queue_peak,
            elapsed: started.elapsed(),
            monitor: monitor_report,
        };

        record_stage(&span, "done");
        info!(
            written = report.written,
            skipped = report.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "pipeline finished"
        );
        Ok((report, sink))
    }
}
