//! # Local CSV Driver
//!
//! Appends records to a CSV file.
//!
//! Writes are serialized twice over: an in-process mutex orders concurrent
//! sessions, and a `<file>.lock` lock file orders separate processes. Each
//! append encodes the header (only for an empty file) and the row into one
//! buffer and issues a single `write_all` on an append-mode handle, so a
//! record is never rewritten or interleaved with another.

use super::lock::{FileLock, lock_path_for};
use super::{AppendReceipt, RecordStore, io_err};
use crate::MindtypeError;
use crate::export::{count_csv_rows, encode_header, encode_row};
use crate::record::ParticipantRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// How long an append waits for another process's lock.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// CSV file backend.
#[derive(Debug)]
pub struct CsvFileStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl CsvFileStore {
    /// Use the CSV file at `path`; it is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Option<Vec<u8>>, MindtypeError> {
        match std::fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err("read csv", e)),
        }
    }
}

impl RecordStore for CsvFileStore {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError> {
        let row = encode_row(record)?;

        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _lock = FileLock::acquire(&lock_path_for(&self.path)?, LOCK_TIMEOUT)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MindtypeError::Persistence(format!("open {}: {}", self.path.display(), e)))?;

        let is_empty = file
            .metadata()
            .map_err(|e| io_err("csv metadata", e))?
            .len()
            == 0;

        let mut buf = if is_empty { encode_header()? } else { Vec::new() };
        buf.extend_from_slice(&row);

        file.write_all(&buf)
            .and_then(|()| file.sync_data())
            .map_err(|e| MindtypeError::Persistence(format!("write {}: {}", self.path.display(), e)))?;

        Ok(AppendReceipt::Stored {
            backend: self.name().to_string(),
        })
    }

    fn count(&self) -> Result<usize, MindtypeError> {
        match self.read_all()? {
            Some(data) if !data.is_empty() => count_csv_rows(&data),
            _ => Ok(0),
        }
    }

    fn export(&self) -> Result<Vec<u8>, MindtypeError> {
        match self.read_all()? {
            Some(data) if !data.is_empty() => Ok(data),
            _ => encode_header(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TaskMetrics;
    use crate::scoring::Severity;
    use crate::types::{Gender, ParticipantId, YearOfStudy};
    use jiff::Timestamp;
    use std::sync::Arc;

    fn record(id: &str) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: ParticipantId::parse(id).expect("id"),
            age: 22,
            gender: Gender::Other,
            year_of_study: YearOfStudy::Fourth,
            phq9_total: 3,
            phq9_severity: Severity::Minimal,
            depression_label: 0,
            phq9_items: [1, 1, 1, 0, 0, 0, 0, 0, 0],
            copy_task: TaskMetrics {
                duration_ms: 1_500,
                word_count: 2,
                char_count: 11,
                text: "hello, \"world\"".to_string(),
            },
            free_writing: TaskMetrics::default(),
            collection_date: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn first_append_writes_header_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvFileStore::new(dir.path().join("records.csv"));

        store.append(&record("AAAA0001")).expect("append 1");
        store.append(&record("AAAA0002")).expect("append 2");

        let text = String::from_utf8(store.export().expect("export")).expect("utf8");
        assert_eq!(text.matches("participant_id,").count(), 1);
        assert!(text.contains("AAAA0001"));
        assert!(text.contains("\"hello, \"\"world\"\"\""));
        assert_eq!(store.count().expect("count"), 2);
    }

    #[test]
    fn missing_file_exports_header_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvFileStore::new(dir.path().join("absent.csv"));
        assert_eq!(store.count().expect("count"), 0);
        let text = String::from_utf8(store.export().expect("export")).expect("utf8");
        assert!(text.starts_with("participant_id"));
    }

    #[test]
    fn concurrent_appends_lose_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(CsvFileStore::new(dir.path().join("records.csv")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .append(&record(&format!("THREAD{:02}", i)))
                        .expect("append");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        assert_eq!(store.count().expect("count"), 8);
    }

    #[test]
    fn unwritable_destination_is_a_persistence_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CsvFileStore::new(dir.path().join("missing_dir").join("records.csv"));
        let started = std::time::Instant::now();
        let err = store.append(&record("AAAA0003")).expect_err("no parent dir");
        assert!(matches!(err, MindtypeError::Persistence(_)));
        assert!(started.elapsed() < LOCK_TIMEOUT / 10);
    }
}
