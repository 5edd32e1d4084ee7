// src/source.rs
//
// Input boundary to the external detector/tracker: its per-frame output is
// replayed from JSON Lines logs, one PoseFrame per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::types::PoseFrame;

/// Find tracker observation logs under `dir`, sorted for a stable replay
/// order.
pub fn find_observation_logs(dir: &str) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_log = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("jsonl"))
            .unwrap_or(false);
        if is_log {
            logs.push(path.to_path_buf());
        }
    }

    logs.sort();
    info!("Found {} observation log(s)", logs.len());
    Ok(logs)
}

/// Pull-based reader over one observation log. Lines that fail to parse
/// are reported and skipped; they never abort the stream.
pub struct ObservationLog {
    reader: BufReader<File>,
    path: PathBuf,
    line_no: u64,
    skipped_lines: u64,
}

impl ObservationLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening observation log {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
            line_no: 0,
            skipped_lines: 0,
        })
    }

    /// Malformed lines encountered so far.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Next frame in the stream, or `None` at end of log.
    pub fn next_frame(&mut self) -> Result<Option<PoseFrame>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("reading {}", self.path.display()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<PoseFrame>(trimmed) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => {
                    self.skipped_lines += 1;
                    warn!(
                        "⚠️  {}:{}: unparseable frame ({}), skipping",
                        self.path.display(),
                        self.line_no,
                        e
                    );
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(lines: &[&str]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        (dir, path)
    }

    #[test]
    fn test_reads_frames_in_order() {
        let (_dir, path) = write_log(&[
            r#"{"timestamp": 100.0, "entities": [{"id": 1, "keypoints": [[1.0, 2.0]]}]}"#,
            r#"{"timestamp": 100.5, "entities": []}"#,
        ]);

        let mut log = ObservationLog::open(&path).unwrap();
        let first = log.next_frame().unwrap().unwrap();
        assert_eq!(first.timestamp, 100.0);
        assert_eq!(first.entities.len(), 1);
        assert_eq!(first.entities[0].id, 1);
        assert_eq!(first.entities[0].keypoints[0], [1.0, 2.0]);

        let second = log.next_frame().unwrap().unwrap();
        assert_eq!(second.timestamp, 100.5);
        assert!(log.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_malformed_and_blank_lines_are_skipped() {
        let (_dir, path) = write_log(&[
            r#"{"timestamp": 1.0, "entities": []}"#,
            "",
            "this is not json",
            r#"{"timestamp": "wrong type"}"#,
            r#"{"timestamp": 2.0, "entities": []}"#,
        ]);

        let mut log = ObservationLog::open(&path).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = log.next_frame().unwrap() {
            frames.push(frame);
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].timestamp, 1.0);
        assert_eq!(frames[1].timestamp, 2.0);
        assert_eq!(log.skipped_lines(), 2);
    }

    #[test]
    fn test_discovery_finds_only_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.jsonl")).unwrap();
        File::create(dir.path().join("b.JSONL")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        let logs = find_observation_logs(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn test_open_missing_log_fails() {
        assert!(ObservationLog::open(Path::new("/nonexistent/frames.jsonl")).is_err());
    }
}
