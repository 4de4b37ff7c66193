//! Typed configuration.
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! environment variables. The CLI applies its flags on top. Validation runs
//! once at the end so a bad value fails before the pipeline starts.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::monitor::MonitorConfig;
use crate::pipeline::PipelineConfig;
use crate::sink::SinkConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub monitor: MonitorConfig,
    pub sink: SinkConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            monitor: MonitorConfig::default(),
            sink: SinkConfig::default(),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the TOML file at `path` (if any), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            let text = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read config file {}: {e}", path.display()))
            })?;
            config.apply_toml(&text)?;
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.monitor.validate()?;
        if self.log_level.trim().is_empty() {
            return Err(Error::Config("log level must not be empty".to_string()));
        }
        Ok(())
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| Error::Config(format!("invalid TOML: {e}")))?;

        let p = file.pipeline;
        if let Some(v) = p.records {
            self.pipeline.num_records = v;
        }
        if let Some(v) = p.parallelism_factor {
            self.pipeline.parallelism_factor = v;
        }
        if let Some(v) = p.producers {
            self.pipeline.producers = Some(v);
        }
        if let Some(v) = p.queue_capacity {
            self.pipeline.queue_capacity = v;
        }

        let m = file.monitor;
        if let Some(ms) = m.sample_interval_ms {
            self.monitor.sample_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = m.checkpoint_interval_ms {
            self.monitor.checkpoint_interval = Duration::from_millis(ms);
        }

        if let Some(sink) = file.sink {
            self.sink = sink.parse()?;
        }
        if file.otel_endpoint.is_some() {
            self.otel_endpoint = file.otel_endpoint;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_var("RECSTREAM_RECORDS")? {
            self.pipeline.num_records = v;
        }
        if let Some(v) = env_var("RECSTREAM_PARALLELISM_FACTOR")? {
            self.pipeline.parallelism_factor = v;
        }
        if let Some(v) = env_var("RECSTREAM_PRODUCERS")? {
            self.pipeline.producers = Some(v);
        }
        if let Some(v) = env_var("RECSTREAM_QUEUE_CAPACITY")? {
            self.pipeline.queue_capacity = v;
        }
        if let Some(ms) = env_var("RECSTREAM_SAMPLE_INTERVAL_MS")? {
            self.monitor.sample_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_var("RECSTREAM_CHECKPOINT_INTERVAL_MS")? {
            self.monitor.checkpoint_interval = Duration::from_millis(ms);
        }
        if let Some(sink) = env_var::<SinkConfig>("RECSTREAM_SINK")? {
            self.sink = sink;
        }
        if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }
}

/// Read and parse an optional environment variable.
fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// TOML layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    pipeline: PipelineSection,
    #[serde(default)]
    monitor: MonitorSection,
    sink: Option<String>,
    otel_endpoint: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineSection {
    records: Option<u64>,
    parallelism_factor: Option<usize>,
    producers: Option<usize>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MonitorSection {
    sample_interval_ms: Option<u64>,
    checkpoint_interval_ms: Option<u64>,
}
