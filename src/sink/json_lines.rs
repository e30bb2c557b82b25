// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::sink::RecordSink;
use crate::source::SourceRecord;

/// Appends records as JSON lines, one output file per topic.
///
/// Records for topic `t` land in `<output_dir>/t.jsonl`. Every batch is
/// flushed and synced before `deliver` returns.
pub struct JsonLinesSink {
    output_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            writers: HashMap::new(),
        })
    }

    /// Output file for a topic
    pub fn topic_path(&self, topic: &str) -> PathBuf {
        self.output_dir.join(format!("{}.jsonl", topic))
    }

    fn writer(&mut self, topic: &str) -> Result<&mut BufWriter<File>> {
        match self.writers.entry(topic.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if topic.contains(['/', '\\']) || topic == "." || topic == ".." {
                    return Err(Error::Config(format!("invalid topic name: {:?}", topic)));
                }
                let path = self.output_dir.join(format!("{}.jsonl", topic));
                debug!(path = ?path, "Opening topic output file");
                let file = OpenOptions::new().create(true).append(true).open(&path)?;
                Ok(entry.insert(BufWriter::new(file)))
            }
        }
    }
}

impl RecordSink for JsonLinesSink {
    fn deliver(&mut self, records: &[SourceRecord]) -> Result<()> {
        for record in records {
            let writer = self.writer(&record.topic)?;
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json_lines"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourcePartition;

    fn record(topic: &str, position: u64, value: &str) -> SourceRecord {
        SourceRecord::new(
            SourcePartition::new("/in/a.log"),
            position,
            topic,
            value.to_string(),
        )
    }

    fn read_back(path: &Path) -> Vec<SourceRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::new(dir.path()).unwrap();

        sink.deliver(&[record("test", 1, "a"), record("test", 2, "b")])
            .unwrap();
        sink.deliver(&[record("test", 3, "c")]).unwrap();

        let written = read_back(&sink.topic_path("test"));
        let values: Vec<_> = written.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
        assert_eq!(written[2].position(), 3);
    }

    #[test]
    fn test_separates_topics() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::new(dir.path().join("out")).unwrap();

        sink.deliver(&[record("left", 1, "l"), record("right", 2, "r")])
            .unwrap();

        assert_eq!(read_back(&sink.topic_path("left")).len(), 1);
        assert_eq!(read_back(&sink.topic_path("right")).len(), 1);
    }

    #[test]
    fn test_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        JsonLinesSink::new(dir.path())
            .unwrap()
            .deliver(&[record("test", 1, "a")])
            .unwrap();

        let mut sink = JsonLinesSink::new(dir.path()).unwrap();
        sink.deliver(&[record("test", 2, "b")]).unwrap();
        assert_eq!(read_back(&sink.topic_path("test")).len(), 2);
    }

    #[test]
    fn test_rejects_path_like_topic() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::new(dir.path()).unwrap();
        let err = sink.deliver(&[record("../escape", 1, "x")]).unwrap_err();
        assert!(err.is_config());
    }
}
