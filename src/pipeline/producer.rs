use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::generator::RecordGenerator;
use crate::model::Partition;
use crate::queue::QueueWriter;

use super::Progress;

/// Counts for one producer's partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub produced: u64,
    pub skipped: u64,
}

/// Producer task: generate every index of `partition` in ascending order and
/// enqueue the records.
///
/// The send suspends while the queue is full. Generation failures are logged
/// and skipped. The task stops early if `abort` fires or the reader closes the
/// queue; either means the consumer has failed.
///
/// `writer` is dropped when this returns, which is what lets the queue close
/// once every producer has finished.
pub async fn produce<G: RecordGenerator>(
    partition: Partition,
    generator: Arc<G>,
    writer: QueueWriter,
    progress: Arc<Progress>,
    abort: CancellationToken,
) -> ProducerStats {
    trace!(producer = partition.producer, "producer started");
    let mut stats = ProducerStats::default();

    for index in partition.indices() {
        let record = match generator.generate(index) {
            Ok(record) => record,
            Err(e) => {
                warn!(producer = partition.producer, index, "skipping record: {e}");
                stats.skipped += 1;
                progress.record_skipped();
                continue;
            }
        };

        let sent = tokio::select! {
            biased;
            _ = abort.cancelled() => false,
            res = writer.send(record) => res.is_ok(),
        };
        if !sent {
            trace!(producer = partition.producer, index, "producer aborted");
            break;
        }
        stats.produced += 1;
        progress.record_produced();
    }

    trace!(
        producer = partition.producer,
        produced = stats.produced,
        skipped = stats.skipped,
        "producer finished"
    );
    stats
}
