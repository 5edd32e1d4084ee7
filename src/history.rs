// src/history.rs
//
// Durable interval history: one JSON file holding every interval closed
// across runs. Merging is read-append-rewrite, never an in-place patch,
// so a reader either sees the old complete file or the new complete file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::types::IntervalRecord;

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `new_records` (in emission order) to the persisted history
    /// and rewrite the file. A missing or unparseable existing file is a
    /// normal first-run/corrupt condition and resets the history to empty;
    /// a failed write is the one error that propagates, since it would
    /// lose the run's entire output.
    pub fn merge(&self, new_records: &[IntervalRecord]) -> Result<usize> {
        let mut records = self.load_existing();
        let existing = records.len();
        records.extend_from_slice(new_records);

        self.write_atomic(&records)
            .with_context(|| format!("writing history {}", self.path.display()))?;

        info!(
            "💾 History updated: {} existing + {} new = {} record(s)",
            existing,
            new_records.len(),
            records.len()
        );
        Ok(records.len())
    }

    fn load_existing(&self) -> Vec<IntervalRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    "⚠️  History {} unreadable ({}), treating as empty",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "⚠️  History {} is corrupt ({}), treating as empty",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Serialize into a temp file next to the target, then rename into
    /// place, so a crash mid-write cannot leave a half-written history.
    fn write_atomic(&self, records: &[IntervalRecord]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, records)?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PoseLabel;

    fn record(person_id: i64, position: PoseLabel, duration_sec: f64) -> IntervalRecord {
        IntervalRecord {
            person_id,
            position,
            duration_sec,
            start: "Mon Jan  5 10:00:00 2026".to_string(),
            end: "Mon Jan  5 10:00:30 2026".to_string(),
        }
    }

    fn read_back(path: &Path) -> Vec<IntervalRecord> {
        let contents = fs::read_to_string(path).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[test]
    fn test_merge_into_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);

        let records = vec![
            record(1, PoseLabel::Standing, 12.5),
            record(2, PoseLabel::Sitting, 3.0),
        ];
        let total = store.merge(&records).unwrap();

        assert_eq!(total, 2);
        assert_eq!(read_back(&path), records);
    }

    #[test]
    fn test_merge_appends_after_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);

        let first = vec![
            record(1, PoseLabel::Standing, 1.0),
            record(1, PoseLabel::Sitting, 2.0),
        ];
        store.merge(&first).unwrap();

        let second = vec![record(2, PoseLabel::Standing, 3.0)];
        let total = store.merge(&second).unwrap();
        assert_eq!(total, 3);

        let all = read_back(&path);
        assert_eq!(&all[..2], &first[..]);
        assert_eq!(&all[2..], &second[..]);
    }

    #[test]
    fn test_corrupt_store_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json at all").unwrap();

        let store = HistoryStore::new(&path);
        let records = vec![record(4, PoseLabel::Sitting, 7.25)];
        let total = store.merge(&records).unwrap();

        assert_eq!(total, 1);
        assert_eq!(read_back(&path), records);
    }

    #[test]
    fn test_merge_with_no_new_records_still_writes_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);

        let total = store.merge(&[]).unwrap();
        assert_eq!(total, 0);
        assert!(read_back(&path).is_empty());
    }

    #[test]
    fn test_merge_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("history.json");
        let store = HistoryStore::new(&path);

        store.merge(&[record(1, PoseLabel::Standing, 1.0)]).unwrap();
        assert_eq!(read_back(&path).len(), 1);
    }

    #[test]
    fn test_persisted_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path);
        store.merge(&[record(9, PoseLabel::Standing, 4.5)]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &raw[0];
        assert_eq!(entry["PersonID"], 9);
        assert_eq!(entry["Position"], "Standing");
        assert_eq!(entry["Duration_sec"], 4.5);
        assert!(entry["Start"].is_string());
        assert!(entry["End"].is_string());
    }
}
