// SPDX-License-Identifier: Apache-2.0

//! File source for tailing a single append-only file.
//!
//! Each newly terminated line becomes one record addressed to the configured
//! topic and tagged with a line-count position. The position is resolved from
//! the checkpoint store at start, so a restarted task neither skips nor
//! repeats lines that were already checkpointed.

pub mod config;
pub mod connector;
pub mod reader;
pub mod record;
pub mod task;

pub use config::FileSourceConfig;
pub use connector::FileSourceConnector;
pub use reader::LineReader;
pub use record::{Checkpoint, Position, SourceOffset, SourcePartition, SourceRecord, ValueSchema};
pub use task::{FileSourceTask, TaskState};
