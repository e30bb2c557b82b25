// SPDX-License-Identifier: Apache-2.0

//! Record sinks and checkpoint commits.
//!
//! A sink takes ownership of each batch the file source emits. Checkpoints
//! are committed only after the sink reports a batch delivered, which gives
//! at-least-once delivery across restarts.

mod blackhole;
mod committer;
mod json_lines;
mod task;

pub use blackhole::BlackholeSink;
pub use committer::{OffsetCommitter, OffsetCommitterConfig};
pub use json_lines::JsonLinesSink;
pub use task::SinkTask;

use crate::error::Result;
use crate::source::SourceRecord;

/// Destination for emitted records
pub trait RecordSink: Send + 'static {
    /// Durably accept a batch. Returning `Ok` makes the batch's positions
    /// eligible for checkpointing.
    fn deliver(&mut self, records: &[SourceRecord]) -> Result<()>;

    /// Flush anything buffered before shutdown
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

impl RecordSink for Box<dyn RecordSink> {
    fn deliver(&mut self, records: &[SourceRecord]) -> Result<()> {
        (**self).deliver(records)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
