use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::Result;
use crate::queue::QueueReader;
use crate::sink::RecordSink;

use super::Progress;

/// Consumer task: drain the queue into `sink` in arrival order.
///
/// Returns the sink once the queue is closed and empty and the sink has been
/// flushed. On the first write or flush error it fires `abort`, closes the
/// reader so blocked producers wake up, and returns the error. Nothing is
/// written after that point.
pub async fn consume<S: RecordSink>(
    mut reader: QueueReader,
    mut sink: S,
    progress: Arc<Progress>,
    abort: CancellationToken,
) -> Result<S> {
    let mut written = 0_u64;

    while let Some(record) = reader.recv().await {
        if let Err(e) = sink.write_record(&record).await {
            error!(record = record.id, written, "sink write failed: {e}");
            abort.cancel();
            reader.close();
            return Err(e);
        }
        written += 1;
        progress.record_written();
    }

    if let Err(e) = sink.flush().await {
        error!(written, "sink flush failed: {e}");
        abort.cancel();
        return Err(e);
    }

    info!(written, "all records written, queue drained");
    Ok(sink)
}
