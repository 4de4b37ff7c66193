//! Resource monitor.
//!
//! Runs beside the pipeline on two timers: a fast one that samples heap and
//! runtime figures and exports them, and a slow one that runs a collection
//! checkpoint. Stops as soon as its cancellation token fires.

pub mod alloc;

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info};

use crate::error::{Error, Result};
use crate::pipeline::Progress;
use crate::telemetry::metrics::Metrics;
use crate::telemetry::span::start_monitor_span;

const MIB: u64 = 1024 * 1024;

/// Timer periods for the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// How often to sample and export.
    pub sample_interval: Duration,
    /// How often to run a collection checkpoint.
    pub checkpoint_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(2),
            checkpoint_interval: Duration::from_secs(10),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            return Err(Error::Config("sample interval must be positive".to_string()));
        }
        if self.checkpoint_interval.is_zero() {
            return Err(Error::Config(
                "checkpoint interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// Snapshot of process state. Exported, logged, then dropped.
#[derive(Debug, Clone)]
pub struct MonitorSample {
    pub timestamp: DateTime<Utc>,
    pub heap_bytes: u64,
    pub peak_heap_bytes: u64,
    pub total_allocated_bytes: u64,
    /// Resident set size, when the platform reports one.
    pub resident_bytes: Option<u64>,
    pub live_tasks: usize,
    pub runtime_workers: usize,
    pub checkpoints: u64,
    pub records_written: u64,
}

impl MonitorSample {
    /// Capture a sample. Must be called from within a tokio runtime.
    pub fn capture(checkpoints: u64, progress: &Progress) -> Self {
        let heap = alloc::heap_stats();
        let runtime = tokio::runtime::Handle::current().metrics();
        Self {
            timestamp: Utc::now(),
            heap_bytes: heap.live_bytes,
            peak_heap_bytes: heap.peak_bytes,
            total_allocated_bytes: heap.total_allocated_bytes,
            resident_bytes: resident_memory_bytes(),
            live_tasks: runtime.num_alive_tasks(),
            runtime_workers: runtime.num_workers(),
            checkpoints,
            records_written: progress.written(),
        }
    }

    fn export(&self, metrics: &Metrics) {
        metrics.live_tasks.record(self.live_tasks as u64, &[]);
        metrics.heap_bytes.record(self.heap_bytes, &[]);
        metrics.records_written.record(self.records_written, &[]);
        metrics.allocated_memory.record(self.heap_bytes as f64, &[]);
    }
}

/// Resident set size of this process via sysinfo (cached instance).
pub fn resident_memory_bytes() -> Option<u64> {
    static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

    let sys = SYSTEM.get_or_init(|| {
        Mutex::new(System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing().with_memory()),
        ))
    });

    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = sys.lock().ok()?;
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        false,
        ProcessRefreshKind::nothing().with_memory(),
    );
    sys.process(pid).map(|p| p.memory())
}

// ---------------------------------------------------------------------------
// Monitor loop
// ---------------------------------------------------------------------------

/// What the monitor did before it was cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub samples: u64,
    pub checkpoints: u64,
}

pub struct Monitor {
    config: MonitorConfig,
    metrics: Metrics,
    progress: Arc<Progress>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, metrics: Metrics, progress: Arc<Progress>) -> Self {
        Self {
            config,
            metrics,
            progress,
        }
    }

    /// Run until `token` is cancelled.
    ///
    /// Neither timer fires before one full period has elapsed. Cancellation
    /// wins over a tick that is ready at the same time, so nothing is exported
    /// once the token has fired.
    pub async fn run(self, token: CancellationToken) -> MonitorReport {
        let span = start_monitor_span();
        self.run_loop(token).instrument(span).await
    }

    async fn run_loop(self, token: CancellationToken) -> MonitorReport {
        let now = Instant::now();
        let mut checkpoint_timer = interval_at(
            now + self.config.checkpoint_interval,
            self.config.checkpoint_interval,
        );
        checkpoint_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sample_timer =
            interval_at(now + self.config.sample_interval, self.config.sample_interval);
        sample_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = MonitorReport::default();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!(
                        samples = report.samples,
                        checkpoints = report.checkpoints,
                        "monitor cancelled, stop sampling"
                    );
                    return report;
                }
                _ = checkpoint_timer.tick() => {
                    let previous_peak = alloc::reset_peak();
                    report.checkpoints += 1;
                    self.metrics.collections.add(1, &[]);
                    info!(
                        checkpoint = report.checkpoints,
                        previous_peak_mib = previous_peak / MIB,
                        "collection checkpoint"
                    );
                }
                _ = sample_timer.tick() => {
                    let sample = MonitorSample::capture(report.checkpoints, &self.progress);
                    sample.export(&self.metrics);
                    report.samples += 1;
                    info!(
                        live_tasks = sample.live_tasks,
                        heap_mib = sample.heap_bytes / MIB,
                        total_alloc_mib = sample.total_allocated_bytes / MIB,
                        rss_mib = sample.resident_bytes.map(|b| b / MIB),
                        checkpoints = sample.checkpoints,
                        written = sample.records_written,
                        "resource sample"
                    );
                    if !alloc::is_active() {
                        debug!("tracking allocator not installed; heap figures read zero");
                    }
                }
            }
        }
    }
}
