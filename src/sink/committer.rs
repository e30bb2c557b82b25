// SPDX-License-Identifier: Apache-2.0

//! Offset committer for at-least-once delivery.
//!
//! Positions become committable only once the sink has accepted the records
//! carrying them. Committable positions are buffered and written to the
//! checkpoint store in one atomic sync, either on the periodic checkpoint
//! interval or during shutdown.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::checkpoint::{JsonFilePersister, PersistedOffsetV1};
use crate::error::{Error, Result};
use crate::source::{Checkpoint, Position, SourcePartition, SourceRecord};

/// Configuration for the offset committer
#[derive(Debug, Clone)]
pub struct OffsetCommitterConfig {
    /// Interval between periodic checkpoints
    pub checkpoint_interval: Duration,
    /// Maximum duration of consecutive checkpoint failures before returning error
    pub max_checkpoint_failure_duration: Duration,
}

impl Default for OffsetCommitterConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: Duration::from_secs(1),
            max_checkpoint_failure_duration: Duration::from_secs(60),
        }
    }
}

pub struct OffsetCommitter {
    persister: JsonFilePersister,
    config: OffsetCommitterConfig,
    /// Delivered but not yet persisted, highest position per partition
    pending: HashMap<SourcePartition, Position>,
    /// Tracks when checkpoint failures started (for threshold-based exit)
    checkpoint_first_failure: Option<Instant>,
}

impl OffsetCommitter {
    /// Create a committer, loading what the store already holds so that a
    /// sync never drops checkpoints for partitions this process is not tailing.
    ///
    /// Every loaded entry must decode: a sync rewrites the whole scope, so a
    /// malformed entry is rejected here instead of being carried along.
    pub fn new(mut persister: JsonFilePersister, config: OffsetCommitterConfig) -> Result<Self> {
        persister.load()?;
        for key in persister.keys() {
            persister
                .try_get_raw_json::<PersistedOffsetV1>(key)
                .map_err(|e| {
                    Error::Persistence(format!("malformed checkpoint for {}: {}", key, e))
                })?;
        }

        Ok(Self {
            persister,
            config,
            pending: HashMap::new(),
            checkpoint_first_failure: None,
        })
    }

    pub fn config(&self) -> &OffsetCommitterConfig {
        &self.config
    }

    /// Mark a delivered batch as committable
    pub fn acknowledge(&mut self, records: &[SourceRecord]) {
        for record in records {
            let Checkpoint {
                partition,
                position,
            } = record.checkpoint();
            let pending = self.pending.entry(partition).or_insert(position);
            *pending = (*pending).max(position);
        }
    }

    /// Number of partitions with uncommitted positions
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Persist all committable positions
    pub fn checkpoint(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        for (partition, position) in &self.pending {
            self.persister.set_checkpoint(&Checkpoint {
                partition: partition.clone(),
                position: *position,
            })?;
        }
        self.persister.sync()?;

        debug!("Checkpoint completed with {} files", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Checkpoint, tolerating failures until they have persisted for longer
    /// than `max_checkpoint_failure_duration`.
    pub fn maybe_checkpoint(&mut self) -> Result<()> {
        match self.checkpoint() {
            Ok(()) => {
                if self.checkpoint_first_failure.is_some() {
                    debug!("Checkpoint succeeded after previous failures");
                    self.checkpoint_first_failure = None;
                }
                Ok(())
            }
            Err(e) => {
                let first_failure = *self
                    .checkpoint_first_failure
                    .get_or_insert_with(Instant::now);
                let failure_duration = first_failure.elapsed();

                if failure_duration >= self.config.max_checkpoint_failure_duration {
                    Err(e)
                } else {
                    warn!(
                        "Checkpoint failed (failures started {:?} ago): {}",
                        failure_duration, e
                    );
                    Ok(())
                }
            }
        }
    }
}
