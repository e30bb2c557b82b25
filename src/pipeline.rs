// SPDX-License-Identifier: Apache-2.0

//! Host loop wiring file source tasks to a record sink.
//!
//! Each configured file gets its own [`FileSourceTask`] on a tokio task. All
//! sources feed one bounded batch channel drained by a single [`SinkTask`],
//! which commits checkpoints after delivery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, error, info};

use crate::bounded_channel::{self, BoundedSender, SendError};
use crate::checkpoint::{JsonFileDatabase, PositionStore};
use crate::error::Error;
use crate::init::wait;
use crate::sink::{OffsetCommitter, OffsetCommitterConfig, RecordSink, SinkTask};
use crate::source::{FileSourceConfig, FileSourceTask, SourceRecord, TaskState};

const BATCH_CHANNEL_SIZE: usize = 16;

/// How long stopped sources and the sink get to finish after cancellation
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Pipeline<S> {
    sources: Vec<FileSourceConfig>,
    db: JsonFileDatabase,
    sink: S,
    committer_config: OffsetCommitterConfig,
}

impl<S: RecordSink> Pipeline<S> {
    /// Build a pipeline. Two sources tailing the same file are rejected, as
    /// both would resume from one checkpoint and deliver every line twice.
    ///
    /// Sameness is judged on the resolved path, so `a.log`, `./a.log` and a
    /// symlink to it all collide. Checkpoints are still keyed by the path as
    /// configured.
    pub fn new(
        sources: Vec<FileSourceConfig>,
        db: JsonFileDatabase,
        sink: S,
    ) -> Result<Self, Error> {
        if sources.is_empty() {
            return Err(Error::Config("at least one file source is required".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &sources {
            source.validate()?;
            if !seen.insert(resolve_source_path(&source.file)) {
                return Err(Error::Config(format!(
                    "file {} is configured for more than one task",
                    source.file.display()
                )));
            }
        }

        Ok(Self {
            sources,
            db,
            sink,
            committer_config: OffsetCommitterConfig::default(),
        })
    }

    pub fn with_committer_config(mut self, config: OffsetCommitterConfig) -> Self {
        self.committer_config = config;
        self
    }

    /// Run until cancelled or until a source or the sink fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), BoxError> {
        let committer = OffsetCommitter::new(self.db.offsets_persister(), self.committer_config)?;
        let (batch_tx, batch_rx) = bounded_channel::bounded(BATCH_CHANNEL_SIZE);

        let mut sink_set: JoinSet<Result<(), BoxError>> = JoinSet::new();
        let sink_task = SinkTask::new(self.sink, committer, batch_rx);
        sink_set.spawn(async move { sink_task.run().await.map_err(|e| e.into()) });

        let store: Arc<dyn PositionStore> = Arc::new(self.db.clone());
        let sources_cancel = cancel.child_token();
        let mut source_set: JoinSet<Result<(), BoxError>> = JoinSet::new();
        for config in self.sources {
            let cancel = sources_cancel.child_token();
            let task = FileSourceTask::new(store.clone()).with_stop_token(cancel.clone());
            let tx = batch_tx.clone();
            source_set.spawn(async move { run_source(task, config, tx, cancel).await });
        }
        // the sink exits once every source has dropped its sender
        drop(batch_tx);

        info!(sources = source_set.len(), "File tail pipeline started");

        let mut result = Ok(());
        tokio::select! {
            res = wait::wait_for_any_task(&mut source_set) => {
                if let Err(e) = res {
                    error!(error = %e, "File source failed, stopping pipeline");
                    result = Err(e);
                }
            }
            res = wait::wait_for_any_task(&mut sink_set) => {
                match res {
                    Ok(()) => debug!("Record sink exited"),
                    Err(e) => {
                        error!(error = %e, "Record sink failed, stopping pipeline");
                        result = Err(e);
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("File tail pipeline cancelled, starting shutdown sequence");
            }
        }

        sources_cancel.cancel();
        if let Err(e) = wait::wait_for_tasks_with_timeout(&mut source_set, SHUTDOWN_TIMEOUT).await
            && result.is_ok()
        {
            result = Err(e);
        }
        if let Err(e) = wait::wait_for_tasks_with_timeout(&mut sink_set, SHUTDOWN_TIMEOUT).await
            && result.is_ok()
        {
            result = Err(e);
        }

        info!("File tail pipeline stopped");
        result
    }
}

/// Canonical path when the file exists, otherwise the absolute spelling
fn resolve_source_path(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn run_source(
    mut task: FileSourceTask,
    config: FileSourceConfig,
    tx: BoundedSender<Vec<SourceRecord>>,
    cancel: CancellationToken,
) -> Result<(), BoxError> {
    task.start(config).await?;

    loop {
        let records = task.poll().await?;
        if task.state() == TaskState::Stopped {
            break;
        }
        if records.is_empty() {
            continue;
        }

        match tx.send_or_cancel(records, &cancel).await {
            Ok(()) => {}
            Err(SendError::Cancelled) => {
                debug!("Send cancelled during shutdown");
                break;
            }
            Err(SendError::Disconnected) => {
                return Err("record sink is no longer accepting batches".into());
            }
        }
    }

    task.stop();
    Ok(())
}
