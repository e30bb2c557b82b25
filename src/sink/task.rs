// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, error, info, warn};

use crate::bounded_channel::BoundedReceiver;
use crate::error::Result;
use crate::sink::{OffsetCommitter, RecordSink};
use crate::source::SourceRecord;

/// Drives a [`RecordSink`]: delivers each batch, then hands its positions to
/// the [`OffsetCommitter`].
///
/// The task runs until every sender of the batch channel is dropped, so
/// batches already emitted by stopping sources are still delivered and
/// checkpointed before it exits.
pub struct SinkTask<S> {
    sink: S,
    committer: OffsetCommitter,
    batches: BoundedReceiver<Vec<SourceRecord>>,
}

impl<S: RecordSink> SinkTask<S> {
    pub fn new(
        sink: S,
        committer: OffsetCommitter,
        batches: BoundedReceiver<Vec<SourceRecord>>,
    ) -> Self {
        Self {
            sink,
            committer,
            batches,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!(sink = self.sink.name(), "Record sink started");

        let mut checkpoint_interval =
            tokio::time::interval(self.committer.config().checkpoint_interval);
        let mut delivered: u64 = 0;

        loop {
            tokio::select! {
                batch = self.batches.next() => {
                    let Some(batch) = batch else {
                        debug!("Batch channel closed, stopping record sink");
                        break;
                    };

                    if let Err(e) = self.sink.deliver(&batch) {
                        error!(sink = self.sink.name(), error = %e, "Failed to deliver records");
                        // keep what was already delivered out of the next run's replay
                        if let Err(ce) = self.committer.checkpoint() {
                            warn!("Failed to checkpoint delivered records: {}", ce);
                        }
                        return Err(e);
                    }
                    delivered += batch.len() as u64;
                    self.committer.acknowledge(&batch);
                }

                _ = checkpoint_interval.tick() => {
                    if let Err(e) = self.committer.maybe_checkpoint() {
                        error!("Checkpoint failures persisted beyond threshold, exiting: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        self.sink.flush()?;
        let files = self.committer.pending_count();
        if let Err(e) = self.committer.checkpoint() {
            warn!(files, "Failed to perform final checkpoint: {}", e);
        } else {
            debug!(files, "Final checkpoint completed");
        }

        info!(sink = self.sink.name(), delivered, "Record sink stopped");
        Ok(())
    }
}
