//! Output sinks for serialized records.
//!
//! The consumer only sees [`RecordSink`]. [`JsonSink`] encodes each record as
//! indented JSON over any `AsyncWrite`; [`Sink`] picks the concrete writer
//! from [`SinkConfig`].

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::model::Record;

/// Append-only destination for records.
///
/// Errors surface synchronously to the caller; the consumer treats any error
/// as fatal.
pub trait RecordSink: Send + 'static {
    fn write_record(&mut self, record: &Record) -> impl Future<Output = Result<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = Result<()>> + Send;
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Where serialized records go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkConfig {
    /// Encode and throw away. Used for throughput runs.
    #[default]
    Discard,
    /// Create or truncate a file.
    File(PathBuf),
    /// Stream to a TCP endpoint (`host:port`).
    Network(String),
}

impl FromStr for SinkConfig {
    type Err = Error;

    /// Parses `discard`, `file:<path>` or `tcp:<host:port>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("discard") {
            return Ok(Self::Discard);
        }
        match s.split_once(':') {
            Some(("file", path)) if !path.is_empty() => Ok(Self::File(PathBuf::from(path))),
            Some(("tcp", addr)) if !addr.is_empty() => Ok(Self::Network(addr.to_string())),
            _ => Err(Error::Config(format!(
                "unknown sink {s:?} (expected discard, file:<path> or tcp:<host:port>)"
            ))),
        }
    }
}

impl fmt::Display for SinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str("discard"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Network(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON encoding
// ---------------------------------------------------------------------------

/// Writes records as 4-space indented JSON documents, one per record, each
/// followed by a newline.
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: BufWriter<W>,
    buf: Vec<u8>,
    written: u64,
}

impl<W: AsyncWrite + Unpin + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            buf: Vec::with_capacity(512),
            written: 0,
        }
    }

    /// Records successfully handed to the writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn encode(&mut self, record: &Record) -> Result<()> {
        self.buf.clear();
        let mut ser = Serializer::with_formatter(&mut self.buf, PrettyFormatter::with_indent(b"    "));
        record.serialize(&mut ser).map_err(|source| Error::Serialize {
            id: record.id,
            source,
        })?;
        self.buf.push(b'\n');

        self.writer
            .write_all(&self.buf)
            .await
            .map_err(|source| Error::SinkWrite {
                id: record.id,
                source,
            })?;
        self.written += 1;
        Ok(())
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> RecordSink for JsonSink<W> {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        self.encode(record).await
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(Error::SinkFlush)
    }
}

// ---------------------------------------------------------------------------
// Concrete sinks
// ---------------------------------------------------------------------------

/// A sink opened from [`SinkConfig`].
#[derive(Debug)]
pub enum Sink {
    File(JsonSink<File>),
    Discard(JsonSink<tokio::io::Sink>),
    Network(JsonSink<TcpStream>),
}

impl Sink {
    /// Open the configured destination.
    ///
    /// Fails with [`Error::SinkUnavailable`] if the file cannot be created or
    /// the endpoint refuses the connection.
    pub async fn open(config: &SinkConfig) -> Result<Self> {
        match config {
            SinkConfig::Discard => Ok(Self::Discard(JsonSink::new(tokio::io::sink()))),
            SinkConfig::File(path) => {
                let file = File::create(path)
                    .await
                    .map_err(|source| Error::SinkUnavailable {
                        target: config.to_string(),
                        source,
                    })?;
                Ok(Self::File(JsonSink::new(file)))
            }
            SinkConfig::Network(addr) => {
                let stream =
                    TcpStream::connect(addr)
                        .await
                        .map_err(|source| Error::SinkUnavailable {
                            target: config.to_string(),
                            source,
                        })?;
                Ok(Self::Network(JsonSink::new(stream)))
            }
        }
    }

    pub fn written(&self) -> u64 {
        match self {
            Self::File(s) => s.written(),
            Self::Discard(s) => s.written(),
            Self::Network(s) => s.written(),
        }
    }
}

impl RecordSink for Sink {
    async fn write_record(&mut self, record: &Record) -> Result<()> {
        match self {
            Self::File(s) => s.write_record(record).await,
            Self::Discard(s) => s.write_record(record).await,
            Self::Network(s) => s.write_record(record).await,
        }
    }

    async fn flush(&mut self) -> Result<()> {
        match self {
            Self::File(s) => s.flush().await,
            Self::Discard(s) => s.flush().await,
            Self::Network(s) => {
                // Only called once the queue has drained: close our write half.
                s.flush().await?;
                s.writer.get_mut().shutdown().await.map_err(Error::SinkFlush)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sink_specs() {
        assert_eq!("discard".parse::<SinkConfig>().unwrap(), SinkConfig::Discard);
        assert_eq!(
            "file:/tmp/out.json".parse::<SinkConfig>().unwrap(),
            SinkConfig::File(PathBuf::from("/tmp/out.json"))
        );
        assert_eq!(
            "tcp:127.0.0.1:9000".parse::<SinkConfig>().unwrap(),
            SinkConfig::Network("127.0.0.1:9000".to_string())
        );
        assert!("file:".parse::<SinkConfig>().is_err());
        assert!("s3://bucket".parse::<SinkConfig>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for text in ["discard", "file:out.json", "tcp:localhost:7000"] {
            let parsed: SinkConfig = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }
}
