//! Bounded work queue between producers and the consumer.
//!
//! A thin wrapper over a tokio `mpsc` channel. Producers hold [`QueueWriter`]
//! clones; the queue closes when the last writer is dropped. The single
//! [`QueueReader`] drains it in FIFO order.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::Record;

/// The reader has gone away; no further records will be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("work queue closed")]
pub struct QueueClosed;

/// Constructor namespace for the bounded queue.
pub struct WorkQueue;

impl WorkQueue {
    /// Create a queue holding at most `capacity` in-flight records.
    ///
    /// Panics if `capacity` is zero; configuration validation rejects that
    /// before any queue is built.
    pub fn bounded(capacity: usize) -> (QueueWriter, QueueReader) {
        let (tx, rx) = mpsc::channel(capacity);
        let peak = Arc::new(AtomicUsize::new(0));
        (
            QueueWriter {
                tx,
                peak: Arc::clone(&peak),
            },
            QueueReader { rx, peak },
        )
    }
}

/// Sending half. Cloned once per producer.
#[derive(Debug, Clone)]
pub struct QueueWriter {
    tx: mpsc::Sender<Record>,
    peak: Arc<AtomicUsize>,
}

impl QueueWriter {
    /// Enqueue a record, suspending the calling task while the queue is full.
    pub async fn send(&self, record: Record) -> Result<(), QueueClosed> {
        self.tx.send(record).await.map_err(|_| QueueClosed)?;
        self.peak.fetch_max(self.in_flight(), Ordering::Relaxed);
        Ok(())
    }

    /// Records currently buffered (including reserved slots).
    pub fn in_flight(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Highest in-flight count observed right after a successful send.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}

/// Receiving half. Owned by the single consumer.
#[derive(Debug)]
pub struct QueueReader {
    rx: mpsc::Receiver<Record>,
    peak: Arc<AtomicUsize>,
}

impl QueueReader {
    /// Next record, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<Record> {
        self.rx.recv().await
    }

    /// Refuse further sends. Buffered records can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }
}
