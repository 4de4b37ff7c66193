//! Metric values reach the exporter.
//!
//! Each test builds the registry on a provider backed by an in-memory
//! exporter and inspects the last export.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{SlowSink, pipeline_config};
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use recstream::monitor::{Monitor, MonitorConfig};
use recstream::pipeline::{Pipeline, Progress};
use recstream::telemetry::metrics::Metrics;
use tokio_util::sync::CancellationToken;

fn in_memory_metrics() -> (Metrics, InMemoryMetricExporter) {
    let exporter = InMemoryMetricExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter.clone()).build())
        .build();
    (Metrics::new(provider), exporter)
}

fn last_export(exporter: &InMemoryMetricExporter) -> ResourceMetrics {
    exporter
        .get_finished_metrics()
        .unwrap()
        .pop()
        .expect("nothing exported")
}

fn find<'a>(exported: &'a ResourceMetrics, name: &str) -> &'a AggregatedMetrics {
    exported
        .scope_metrics()
        .flat_map(|scope| scope.metrics())
        .find(|metric| metric.name() == name)
        .map(|metric| metric.data())
        .unwrap_or_else(|| panic!("metric {name} not exported"))
}

fn u64_gauge(exported: &ResourceMetrics, name: &str) -> u64 {
    match find(exported, name) {
        AggregatedMetrics::U64(MetricData::Gauge(gauge)) => gauge
            .data_points()
            .next()
            .map(|point| point.value())
            .unwrap_or_else(|| panic!("{name} has no data point")),
        _ => panic!("{name} is not a u64 gauge"),
    }
}

fn f64_gauge(exported: &ResourceMetrics, name: &str) -> f64 {
    match find(exported, name) {
        AggregatedMetrics::F64(MetricData::Gauge(gauge)) => gauge
            .data_points()
            .next()
            .map(|point| point.value())
            .unwrap_or_else(|| panic!("{name} has no data point")),
        _ => panic!("{name} is not an f64 gauge"),
    }
}

fn u64_sum(exported: &ResourceMetrics, name: &str) -> u64 {
    match find(exported, name) {
        AggregatedMetrics::U64(MetricData::Sum(sum)) => {
            sum.data_points().map(|point| point.value()).sum()
        }
        _ => panic!("{name} is not a u64 counter"),
    }
}

fn histogram_count(exported: &ResourceMetrics, name: &str) -> u64 {
    match find(exported, name) {
        AggregatedMetrics::F64(MetricData::Histogram(histogram)) => {
            histogram.data_points().map(|point| point.count()).sum()
        }
        _ => panic!("{name} is not an f64 histogram"),
    }
}

#[tokio::test(start_paused = true)]
async fn run_exports_start_gauges_and_monitor_series() {
    let (metrics, exporter) = in_memory_metrics();
    let monitor = MonitorConfig {
        sample_interval: Duration::from_millis(10),
        checkpoint_interval: Duration::from_millis(25),
    };
    let pipeline = Pipeline::new(pipeline_config(20, 2, 2), monitor, metrics);
    let sink = SlowSink {
        delay: Duration::from_millis(5),
        ..SlowSink::default()
    };

    let (report, _) = pipeline.run(sink).await.unwrap();
    assert_eq!(report.written, 20);
    assert!(report.monitor.samples >= 1, "{:?}", report.monitor);
    assert!(report.monitor.checkpoints >= 1, "{:?}", report.monitor);

    let exported = last_export(&exporter);

    assert!(f64_gauge(&exported, "recstream.start_timestamp") > 0.0);
    assert_eq!(
        u64_gauge(&exported, "recstream.cpu_count"),
        num_cpus::get() as u64
    );
    assert_eq!(u64_gauge(&exported, "recstream.producers"), 2);
    assert_eq!(u64_gauge(&exported, "recstream.chunk_size"), 10);
    assert_eq!(u64_gauge(&exported, "recstream.records_written"), 20);

    assert_eq!(
        u64_sum(&exported, "recstream.collections"),
        report.monitor.checkpoints
    );
    assert_eq!(
        histogram_count(&exported, "recstream.allocated_memory"),
        report.monitor.samples
    );
    assert!(u64_gauge(&exported, "recstream.live_tasks") >= 1);
    // Present even when the tracking allocator is not installed.
    u64_gauge(&exported, "recstream.heap_bytes");
}

#[tokio::test(start_paused = true)]
async fn monitor_series_match_its_report() {
    let (metrics, exporter) = in_memory_metrics();
    let monitor = Monitor::new(
        MonitorConfig {
            sample_interval: Duration::from_secs(2),
            checkpoint_interval: Duration::from_secs(10),
        },
        metrics.clone(),
        Arc::new(Progress::default()),
    );

    let token = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(token.clone()));
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    token.cancel();
    let report = handle.await.unwrap();

    metrics.export().unwrap();
    let exported = last_export(&exporter);

    assert_eq!(report.samples, 5);
    assert_eq!(report.checkpoints, 1);
    assert_eq!(histogram_count(&exported, "recstream.allocated_memory"), 5);
    assert_eq!(u64_sum(&exported, "recstream.collections"), 1);
    assert_eq!(u64_gauge(&exported, "recstream.records_written"), 0);
}

#[test]
fn skipped_records_are_counted() {
    let (metrics, exporter) = in_memory_metrics();
    metrics.records_skipped.add(3, &[]);
    metrics.records_skipped.add(4, &[]);
    metrics.export().unwrap();

    let exported = last_export(&exporter);
    assert_eq!(u64_sum(&exported, "recstream.records_skipped"), 7);
}
