// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use crate::source::record::{Position, SourcePartition};

/// Read side of the checkpoint store.
///
/// The tailing task only ever reads: it resolves its resume position once at
/// start. Writes belong to whoever acknowledges delivery.
pub trait PositionStore: Send + Sync {
    /// Last durably recorded position for the partition, or `None` if the
    /// partition has never been checkpointed.
    fn get_checkpoint(&self, partition: &SourcePartition) -> Result<Option<Position>>;
}

/// Mock position store for testing
#[cfg(test)]
pub struct MockPositionStore {
    positions: std::collections::HashMap<String, Position>,
    fail: bool,
}

#[cfg(test)]
impl MockPositionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            positions: std::collections::HashMap::new(),
            fail: false,
        }
    }

    /// Create a store whose reads always fail
    pub fn failing() -> Self {
        Self {
            positions: std::collections::HashMap::new(),
            fail: true,
        }
    }

    pub fn with_position(mut self, partition: &SourcePartition, position: Position) -> Self {
        self.positions.insert(partition.key().to_string(), position);
        self
    }
}

#[cfg(test)]
impl PositionStore for MockPositionStore {
    fn get_checkpoint(&self, partition: &SourcePartition) -> Result<Option<Position>> {
        if self.fail {
            return Err(crate::error::Error::Persistence(
                "mock store unavailable".to_string(),
            ));
        }
        Ok(self.positions.get(partition.key()).copied())
    }
}
