// SPDX-License-Identifier: Apache-2.0

//! Resumable tailing task.
//!
//! Lifecycle: `Created -> Started -> Polling -> Stopped`, with `Failed` as a
//! terminal state for a poll that could not read the source. The resume
//! position is resolved from the [`PositionStore`] once per start; afterwards
//! it only lives in memory and advances by one per emitted record.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::checkpoint::PositionStore;
use crate::error::{Error, Result};
use crate::source::config::FileSourceConfig;
use crate::source::reader::LineReader;
use crate::source::record::{Position, SourcePartition, SourceRecord};

/// Lifecycle state of a [`FileSourceTask`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    /// Resolving the resume position
    Started,
    Polling,
    Failed,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Started => "started",
            TaskState::Polling => "polling",
            TaskState::Failed => "failed",
            TaskState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Values fixed for the lifetime of one start
struct Running {
    partition: SourcePartition,
    topic: String,
    poll_interval: Duration,
    reader: LineReader,
}

/// Tails a single file and turns each new line into a [`SourceRecord`].
///
/// Expects a single caller: `start` once, then `poll` in a loop. Use
/// [`FileSourceTask::stop_handle`] to stop it from elsewhere, including while
/// a poll is waiting out its delay.
pub struct FileSourceTask {
    store: Arc<dyn PositionStore>,
    state: TaskState,
    running: Option<Running>,
    position: Position,
    cancel: CancellationToken,
    /// Host token that cancels every token this task runs with
    parent: Option<CancellationToken>,
}

impl FileSourceTask {
    /// Create a task reading its resume position from `store`
    pub fn new(store: Arc<dyn PositionStore>) -> Self {
        Self {
            store,
            state: TaskState::Created,
            running: None,
            position: 0,
            cancel: CancellationToken::new(),
            parent: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Lines emitted so far for the current source identity
    pub fn position(&self) -> Position {
        self.position
    }

    /// Stop this task when `token` is cancelled, e.g. a child of a host
    /// shutdown token.
    pub fn with_stop_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token.child_token();
        self.parent = Some(token);
        self
    }

    /// Token that stops this task when cancelled
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate the config and resolve where reading resumes.
    ///
    /// Allowed from `Created`, `Stopped` and `Failed`. A restart always
    /// re-reads the position from the store rather than trusting memory.
    pub async fn start(&mut self, config: FileSourceConfig) -> Result<()> {
        if matches!(self.state, TaskState::Started | TaskState::Polling) {
            return Err(Error::AlreadyRunning);
        }

        config.validate()?;

        self.state = TaskState::Started;
        self.running = None;
        if self.cancel.is_cancelled() {
            self.cancel = match &self.parent {
                Some(parent) => parent.child_token(),
                None => CancellationToken::new(),
            };
        }

        let partition = SourcePartition::from_path(&config.file);
        let position = match self.store.get_checkpoint(&partition) {
            Ok(position) => position.unwrap_or(0),
            Err(e) => {
                error!(file = %partition.key(), error = %e, "Failed to resolve resume position");
                self.state = TaskState::Failed;
                return Err(e);
            }
        };

        info!(
            file = %partition.key(),
            topic = %config.topic,
            position,
            "Starting file source task"
        );

        self.position = position;
        self.running = Some(Running {
            reader: LineReader::new(&config.file),
            partition,
            topic: config.topic,
            poll_interval: config.poll_interval,
        });
        self.state = TaskState::Polling;

        Ok(())
    }

    /// Wait out the poll interval, then emit every line added since the last
    /// emitted position.
    ///
    /// An empty batch means no new data. A read failure moves the task to
    /// `Failed` and nothing from that cycle is emitted.
    pub async fn poll(&mut self) -> Result<Vec<SourceRecord>> {
        if self.state != TaskState::Polling {
            return Err(Error::NotRunning(self.state));
        }
        let Some(running) = self.running.as_ref() else {
            return Err(Error::NotRunning(self.state));
        };

        select! {
            biased;

            _ = self.cancel.cancelled() => {
                debug!("File source task cancelled while waiting to poll");
                self.state = TaskState::Stopped;
                return Ok(Vec::new());
            }

            _ = tokio::time::sleep(running.poll_interval) => {}
        }

        let reader = running.reader.clone();
        let start = self.position;
        let read = tokio::task::spawn_blocking(move || reader.read_lines_from(start))
            .await
            .map_err(Error::from)
            .and_then(|r| r);

        let lines = match read {
            Ok(lines) => lines,
            Err(e) => {
                error!(file = %running.partition.key(), error = %e, "Failed to read source file");
                self.state = TaskState::Failed;
                return Err(e);
            }
        };

        let mut records = Vec::with_capacity(lines.len());
        let mut position = self.position;
        for line in lines {
            position += 1;
            records.push(SourceRecord::new(
                running.partition.clone(),
                position,
                running.topic.as_str(),
                line,
            ));
        }
        self.position = position;

        if !records.is_empty() {
            debug!(
                file = %running.partition.key(),
                count = records.len(),
                position,
                "Read new lines"
            );
        }

        Ok(records)
    }

    /// Stop the task. Safe to call in any state and more than once.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if self.state != TaskState::Stopped {
            debug!(state = %self.state, "Stopping file source task");
        }
        self.state = TaskState::Stopped;
    }
}
