// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::source::record::Position;

/// Reads complete lines from an append-only file.
///
/// The file is reopened on every read so that content appended between reads
/// is visible. No handle is held between calls.
#[derive(Debug, Clone)]
pub struct LineReader {
    path: PathBuf,
}

impl LineReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every terminated line after the first `start` lines.
    ///
    /// A trailing line without a terminator is left for a later read. Both
    /// `\n` and `\r\n` terminate a line; bytes are decoded lossily.
    pub fn read_lines_from(&self, start: Position) -> Result<Vec<String>> {
        let file =
            File::open(&self.path).map_err(|e| Error::source_unavailable(&self.path, e))?;
        let mut reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut buf = Vec::new();
        let mut index: Position = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| Error::source_unavailable(&self.path, e))?;
            if read == 0 || buf.last() != Some(&b'\n') {
                break;
            }

            index += 1;
            if index <= start {
                continue;
            }

            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reader_reads_all_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line 1").unwrap();
        writeln!(file, "line 2").unwrap();
        writeln!(file, "line 3").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        let lines = reader.read_lines_from(0).unwrap();
        assert_eq!(lines, vec!["line 1", "line 2", "line 3"]);
    }

    #[test]
    fn test_reader_skips_start_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\nb\nc\n").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        assert_eq!(reader.read_lines_from(2).unwrap(), vec!["c"]);
        assert!(reader.read_lines_from(3).unwrap().is_empty());
        assert!(reader.read_lines_from(10).unwrap().is_empty());
    }

    #[test]
    fn test_reader_holds_back_partial_line() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "done\npart").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        assert_eq!(reader.read_lines_from(0).unwrap(), vec!["done"]);

        write!(file, "ial\n").unwrap();
        file.flush().unwrap();
        assert_eq!(reader.read_lines_from(1).unwrap(), vec!["partial"]);
    }

    #[test]
    fn test_reader_sees_appended_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        assert_eq!(reader.read_lines_from(0).unwrap(), vec!["first"]);

        let mut f = std::fs::OpenOptions::new()
            .append(true)
            .open(file.path())
            .unwrap();
        writeln!(f, "second").unwrap();
        f.flush().unwrap();

        assert_eq!(reader.read_lines_from(1).unwrap(), vec!["second"]);
    }

    #[test]
    fn test_reader_keeps_empty_and_crlf_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "one\r\n\nthree\n").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        assert_eq!(reader.read_lines_from(0).unwrap(), vec!["one", "", "three"]);
    }

    #[test]
    fn test_reader_invalid_utf8_still_counts() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"ok\n\xff\xfe\nafter\n").unwrap();
        file.flush().unwrap();

        let reader = LineReader::new(file.path());
        let lines = reader.read_lines_from(0).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "after");
    }

    #[test]
    fn test_reader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LineReader::new(dir.path().join("missing.txt"));

        match reader.read_lines_from(0) {
            Err(Error::SourceUnavailable { path, source }) => {
                assert_eq!(path, dir.path().join("missing.txt"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }
}
