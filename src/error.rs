//! Error types for recstream.

use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Sink,
    Producer,
    Consumer,
    Telemetry,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Sink => "sink",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
            Self::Telemetry => "telemetry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sink unavailable: {target}: {source}")]
    SinkUnavailable {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record {id}: {source}")]
    Serialize {
        id: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write record {id} to sink: {source}")]
    SinkWrite {
        id: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to flush sink: {0}")]
    SinkFlush(#[source] std::io::Error),

    #[error("{stage} task failed: {reason}")]
    Task { stage: Stage, reason: String },

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl Error {
    /// The stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::SinkUnavailable { .. } => Stage::Sink,
            Self::Serialize { .. } | Self::SinkWrite { .. } | Self::SinkFlush(_) => {
                Stage::Consumer
            }
            Self::Task { stage, .. } => *stage,
            Self::Telemetry(_) => Stage::Telemetry,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
