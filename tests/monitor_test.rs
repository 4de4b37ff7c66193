//! Integration tests for the resource monitor.
//!
//! Time is paused so timer ticks are deterministic.

use std::sync::Arc;
use std::time::Duration;

use recstream::monitor::{Monitor, MonitorConfig, MonitorReport, MonitorSample};
use recstream::pipeline::Progress;
use recstream::telemetry::metrics::Metrics;
use tokio_util::sync::CancellationToken;

fn monitor(sample_secs: u64, checkpoint_secs: u64) -> Monitor {
    Monitor::new(
        MonitorConfig {
            sample_interval: Duration::from_secs(sample_secs),
            checkpoint_interval: Duration::from_secs(checkpoint_secs),
        },
        Metrics::disabled(),
        Arc::new(Progress::default()),
    )
}

#[tokio::test(start_paused = true)]
async fn samples_and_checkpoints_on_their_own_timers() {
    let token = CancellationToken::new();
    let handle = tokio::spawn(monitor(2, 10).run(token.clone()));

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    token.cancel();
    let report = handle.await.unwrap();

    // Samples at 2, 4, 6, 8 and 10 seconds; one checkpoint at 10.
    assert_eq!(
        report,
        MonitorReport {
            samples: 5,
            checkpoints: 1,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn immediate_cancel_exports_nothing() {
    let token = CancellationToken::new();
    token.cancel();

    let report = monitor(2, 10).run(token).await;
    assert_eq!(report, MonitorReport::default());
}

#[tokio::test(start_paused = true)]
async fn no_samples_after_cancellation() {
    let token = CancellationToken::new();
    let handle = tokio::spawn(monitor(2, 10).run(token.clone()));

    tokio::time::sleep(Duration::from_millis(3_000)).await;
    token.cancel();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let report = handle.await.unwrap();
    assert!(report.samples <= 1, "sampled {} times", report.samples);
    assert_eq!(report.checkpoints, 0);
}

#[tokio::test]
async fn sample_reads_runtime_and_progress() {
    let progress = Progress::default();
    let sample = MonitorSample::capture(3, &progress);

    assert_eq!(sample.checkpoints, 3);
    assert_eq!(sample.records_written, 0);
    assert!(sample.runtime_workers >= 1);
    // Heap figures stay at zero unless the tracking allocator is installed.
    assert!(sample.peak_heap_bytes >= sample.heap_bytes || sample.heap_bytes == 0);
}

#[test]
fn zero_intervals_are_rejected() {
    let config = MonitorConfig {
        sample_interval: Duration::ZERO,
        ..MonitorConfig::default()
    };
    assert!(config.validate().is_err());
    assert!(MonitorConfig::default().validate().is_ok());
}
