// SPDX-License-Identifier: Apache-2.0

//! Resume correctness across process restarts, using a file backed
//! checkpoint database.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filetail::checkpoint::{JsonFileDatabase, PositionStore};
use filetail::error::Error;
use filetail::pipeline::Pipeline;
use filetail::sink::{JsonLinesSink, OffsetCommitter, OffsetCommitterConfig};
use filetail::source::{
    FileSourceConfig, FileSourceTask, SourcePartition, SourceRecord, TaskState,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn source_config(file: &Path) -> FileSourceConfig {
    FileSourceConfig {
        file: file.to_path_buf(),
        topic: "lines".to_string(),
        poll_interval: Duration::from_millis(10),
    }
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    f.write_all(text.as_bytes()).unwrap();
}

fn commit(db: &JsonFileDatabase, records: &[SourceRecord]) {
    let mut committer =
        OffsetCommitter::new(db.offsets_persister(), OffsetCommitterConfig::default()).unwrap();
    committer.acknowledge(records);
    committer.checkpoint().unwrap();
}

fn values(records: &[SourceRecord]) -> Vec<(u64, &str)> {
    records
        .iter()
        .map(|r| (r.position(), r.value.as_str()))
        .collect()
}

#[tokio::test]
async fn test_resume_after_restart_emits_only_new_lines() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.log");
    let offsets = dir.path().join("offsets.json");
    append(&input, "a\nb\nc\n");

    let db = JsonFileDatabase::open(&offsets).unwrap();
    let mut task = FileSourceTask::new(Arc::new(db.clone()));
    task.start(source_config(&input)).await.unwrap();
    let records = task.poll().await.unwrap();
    assert_eq!(values(&records), vec![(1, "a"), (2, "b"), (3, "c")]);
    commit(&db, &records);
    task.stop();
    drop(db);

    append(&input, "d\n");

    let db = JsonFileDatabase::open(&offsets).unwrap();
    let mut task = FileSourceTask::new(Arc::new(db));
    task.start(source_config(&input)).await.unwrap();
    assert_eq!(task.position(), 3);

    let records = task.poll().await.unwrap();
    assert_eq!(values(&records), vec![(4, "d")]);
    task.stop();
}

#[tokio::test]
async fn test_uncommitted_lines_are_redelivered() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.log");
    let offsets = dir.path().join("offsets.json");
    append(&input, "a\nb\n");

    let db = JsonFileDatabase::open(&offsets).unwrap();
    let mut task = FileSourceTask::new(Arc::new(db.clone()));
    task.start(source_config(&input)).await.unwrap();
    let records = task.poll().await.unwrap();
    commit(&db, &records[..1]);
    task.stop();

    let mut task = FileSourceTask::new(Arc::new(JsonFileDatabase::open(&offsets).unwrap()));
    task.start(source_config(&input)).await.unwrap();
    let records = task.poll().await.unwrap();
    assert_eq!(values(&records), vec![(2, "b")]);
}

#[tokio::test]
async fn test_missing_source_is_fatal() {
    let dir = TempDir::new().unwrap();
    let db = JsonFileDatabase::open_memory();

    let mut task = FileSourceTask::new(Arc::new(db));
    task.start(source_config(&dir.path().join("absent.log")))
        .await
        .unwrap();

    let err = task.poll().await.unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { .. }));
    assert_eq!(task.state(), TaskState::Failed);
}

fn output_records(path: &Path) -> Vec<SourceRecord> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect(),
        Err(_) => Vec::new(),
    }
}

async fn wait_for_output(path: &Path, count: usize) {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while output_records(path).len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for sink output");
}

async fn run_until(input: &Path, offsets: &Path, out_dir: &Path, expected: usize) -> PathBuf {
    let db = JsonFileDatabase::open(offsets).unwrap();
    let sink = JsonLinesSink::new(out_dir).unwrap();
    let out_path = sink.topic_path("lines");
    let pipeline = Pipeline::new(vec![source_config(input)], db, sink)
        .unwrap()
        .with_committer_config(OffsetCommitterConfig {
            checkpoint_interval: Duration::from_millis(20),
            ..Default::default()
        });

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_for_output(&out_path, expected).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();
    out_path
}

#[tokio::test]
async fn test_pipeline_resumes_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.log");
    let offsets = dir.path().join("offsets.json");
    let out_dir = dir.path().join("out");
    append(&input, "one\ntwo\nthree\n");

    run_until(&input, &offsets, &out_dir, 3).await;

    let db = JsonFileDatabase::open(&offsets).unwrap();
    assert_eq!(
        db.get_checkpoint(&SourcePartition::from_path(&input)).unwrap(),
        Some(3)
    );

    append(&input, "four\nfive\n");
    let out_path = run_until(&input, &offsets, &out_dir, 5).await;

    let written = output_records(&out_path);
    let positions: Vec<u64> = written.iter().map(|r| r.position()).collect();
    assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    assert_eq!(written[3].value, "four");
    assert!(written.iter().all(|r| r.topic == "lines"));
}

#[tokio::test]
async fn test_pipeline_rejects_duplicate_sources() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.log");
    let sink = JsonLinesSink::new(dir.path().join("out")).unwrap();

    let res = Pipeline::new(
        vec![source_config(&input), source_config(&input)],
        JsonFileDatabase::open_memory(),
        sink,
    );
    assert!(res.err().is_some_and(|e| e.is_config()));
}

#[tokio::test]
async fn test_pipeline_fails_on_missing_source() {
    let dir = TempDir::new().unwrap();
    let sink = JsonLinesSink::new(dir.path().join("out")).unwrap();
    let pipeline = Pipeline::new(
        vec![source_config(&dir.path().join("absent.log"))],
        JsonFileDatabase::open_memory(),
        sink,
    )
    .unwrap();

    let res = tokio::time::timeout(TEST_TIMEOUT, pipeline.run(CancellationToken::new()))
        .await
        .expect("pipeline did not stop");
    assert!(res.unwrap_err().to_string().contains("absent.log"));
}
