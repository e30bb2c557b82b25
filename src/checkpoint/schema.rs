// SPDX-License-Identifier: Apache-2.0

//! Persisted checkpoint schema.
//!
//! Each tailed file is stored under its own key inside the offsets scope, so
//! the JSON document stays readable and hand-editable.

use serde::{Deserialize, Serialize};

use crate::source::record::{Checkpoint, Position};

/// Scope holding file source checkpoints in the database
pub const OFFSETS_SCOPE: &str = "file_source";

/// Current schema version for persisted checkpoints
pub const PERSISTED_OFFSET_VERSION: u8 = 1;

/// Persisted checkpoint for a single file (v1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedOffsetV1 {
    /// Schema version (always 1 for this format)
    pub version: u8,
    /// Tailed file, as configured
    pub filename: String,
    /// Number of lines delivered
    pub position: Position,
}

impl From<&Checkpoint> for PersistedOffsetV1 {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self {
            version: PERSISTED_OFFSET_VERSION,
            filename: checkpoint.partition.filename.clone(),
            position: checkpoint.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::record::SourcePartition;

    #[test]
    fn test_from_checkpoint() {
        let checkpoint = Checkpoint {
            partition: SourcePartition::new("/var/log/test.log"),
            position: 42,
        };
        let entry = PersistedOffsetV1::from(&checkpoint);
        assert_eq!(entry.version, PERSISTED_OFFSET_VERSION);
        assert_eq!(entry.filename, "/var/log/test.log");
        assert_eq!(entry.position, 42);
    }

    #[test]
    fn test_rejects_missing_position() {
        let value = serde_json::json!({"version": 1, "filename": "a.log"});
        assert!(serde_json::from_value::<PersistedOffsetV1>(value).is_err());
    }
}
