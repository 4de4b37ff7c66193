//! Shared sinks and helpers for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use recstream::error::{Error, Result};
use recstream::model::Record;
use recstream::monitor::MonitorConfig;
use recstream::pipeline::{Pipeline, PipelineConfig};
use recstream::sink::RecordSink;
use recstream::telemetry::metrics::Metrics;

/// Keeps every record it receives, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    pub records: Arc<Mutex<Vec<Record>>>,
    pub flushed: Arc<Mutex<bool>>,
}

impl CollectSink {
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for CollectSink {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        *self.flushed.lock().unwrap() = true;
        Ok(())
    }
}

/// Accepts `fail_at` records, then fails every write after that.
#[derive(Debug, Clone)]
pub struct FailingSink {
    pub fail_at: usize,
    pub written: Arc<Mutex<Vec<u64>>>,
    pub attempts: Arc<Mutex<usize>>,
}

impl FailingSink {
    pub fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            written: Arc::default(),
            attempts: Arc::default(),
        }
    }
}

impl RecordSink for FailingSink {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        let mut written = self.written.lock().unwrap();
        if written.len() >= self.fail_at {
            return Err(Error::SinkWrite {
                id: record.id,
                source: std::io::Error::other("disk full"),
            });
        }
        written.push(record.id);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sleeps before accepting each record.
#[derive(Clone, Default)]
pub struct SlowSink {
    pub delay: Duration,
    pub inner: CollectSink,
}

impl RecordSink for SlowSink {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.write_record(record).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await
    }
}

pub fn pipeline_config(num_records: u64, producers: usize, queue_capacity: usize) -> PipelineConfig {
    PipelineConfig {
        num_records,
        parallelism_factor: 1,
        producers: Some(producers),
        queue_capacity,
    }
}

/// Monitor periods long enough that tests never see a tick.
pub fn quiet_monitor() -> MonitorConfig {
    MonitorConfig {
        sample_interval: Duration::from_secs(3600),
        checkpoint_interval: Duration::from_secs(3600),
    }
}

pub fn pipeline(num_records: u64, producers: usize, queue_capacity: usize) -> Pipeline {
    Pipeline::new(
        pipeline_config(num_records, producers, queue_capacity),
        quiet_monitor(),
        Metrics::disabled(),
    )
}
