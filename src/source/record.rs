// SPDX-License-Identifier: Apache-2.0

//! Records emitted by the file source and the position markers attached to them.
//!
//! A record carries the position to resume *after* it: the first line of a
//! file is emitted with position 1, the second with position 2, and so on.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Partition field naming the tailed file
pub const FILENAME_FIELD: &str = "filename";

/// Offset field holding the number of lines emitted so far
pub const POSITION_FIELD: &str = "position";

/// Number of lines already emitted for a source identity.
pub type Position = u64;

/// Source identity used as the checkpoint partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePartition {
    pub filename: String,
}

impl SourcePartition {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.display().to_string())
    }

    /// Key used to address this partition in the position store
    pub fn key(&self) -> &str {
        &self.filename
    }
}

/// Offset map attached to every record for checkpointing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOffset {
    pub position: Position,
}

/// Schema tag describing the record payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSchema {
    /// Raw line text, forwarded as-is
    #[default]
    String,
}

/// One line of the source file, addressed to a destination stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_partition: SourcePartition,
    pub source_offset: SourceOffset,
    pub topic: String,
    pub value_schema: ValueSchema,
    pub value: String,
}

impl SourceRecord {
    pub fn new(
        source_partition: SourcePartition,
        position: Position,
        topic: impl Into<String>,
        value: String,
    ) -> Self {
        Self {
            source_partition,
            source_offset: SourceOffset { position },
            topic: topic.into(),
            value_schema: ValueSchema::String,
            value,
        }
    }

    pub fn position(&self) -> Position {
        self.source_offset.position
    }

    /// The checkpoint that becomes committable once this record is delivered
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            partition: self.source_partition.clone(),
            position: self.position(),
        }
    }
}

/// Persisted (source identity, position) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub partition: SourcePartition,
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = SourceRecord::new(
            SourcePartition::new("/tmp/app.log"),
            3,
            "test",
            "hello".to_string(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source_partition"][FILENAME_FIELD], "/tmp/app.log");
        assert_eq!(json["source_offset"][POSITION_FIELD], 3);
        assert_eq!(json["value_schema"], "string");
        assert_eq!(json["topic"], "test");
        assert_eq!(json["value"], "hello");
    }

    #[test]
    fn test_record_checkpoint() {
        let record = SourceRecord::new(SourcePartition::new("a.log"), 7, "t", "x".to_string());
        let checkpoint = record.checkpoint();
        assert_eq!(checkpoint.partition.key(), "a.log");
        assert_eq!(checkpoint.position, 7);
    }
}
