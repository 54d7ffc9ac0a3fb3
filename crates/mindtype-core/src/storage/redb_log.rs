//! # redb Record Log
//!
//! A log-structured record store on the redb embedded database.
//!
//! Records are postcard-encoded under a monotonically increasing sequence
//! number. redb provides:
//! - ACID transactions (a record is either fully present or absent)
//! - Crash safety (copy-on-write B-trees)
//! - Single writer, so concurrent appends are serialized by the database
//!
//! The same store doubles as the local journal behind
//! [`FallbackStore`](super::FallbackStore).

use super::{AppendReceipt, RecordStore};
use crate::MindtypeError;
use crate::export::export_csv;
use crate::record::ParticipantRecord;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};

/// Table for records: sequence(u64) -> postcard ParticipantRecord bytes
const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_SEQ_KEY: &str = "next_seq";

fn db_err(e: impl std::fmt::Display) -> MindtypeError {
    MindtypeError::Persistence(e.to_string())
}

/// redb-backed append-only record log.
pub struct RedbLogStore {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLogStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbLogStore {
    /// Open or create a record log at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MindtypeError> {
        let db = Database::create(path.as_ref()).map_err(db_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(db_err)?;
            let _ = write_txn.open_table(RECORDS).map_err(db_err)?;
            let _ = write_txn.open_table(METADATA).map_err(db_err)?;
            write_txn.commit().map_err(db_err)?;
        }

        Ok(Self {
            db,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a record and return its sequence number.
    pub fn push(&self, record: &ParticipantRecord) -> Result<u64, MindtypeError> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| MindtypeError::Serialization(e.to_string()))?;

        let write_txn = self.db.begin_write().map_err(db_err)?;
        let seq = {
            let mut meta_table = write_txn.open_table(METADATA).map_err(db_err)?;
            let seq = meta_table
                .get(NEXT_SEQ_KEY)
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            meta_table
                .insert(NEXT_SEQ_KEY, seq.saturating_add(1))
                .map_err(db_err)?;
            seq
        };
        {
            let mut records_table = write_txn.open_table(RECORDS).map_err(db_err)?;
            records_table
                .insert(seq, bytes.as_slice())
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(seq)
    }

    /// All stored records in sequence order.
    pub fn records(&self) -> Result<Vec<(u64, ParticipantRecord)>, MindtypeError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS).map_err(db_err)?;

        let mut out = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (key, value) = entry.map_err(db_err)?;
            let record: ParticipantRecord = postcard::from_bytes(value.value())
                .map_err(|e| MindtypeError::Serialization(e.to_string()))?;
            out.push((key.value(), record));
        }
        Ok(out)
    }

    /// Remove one record by sequence number. Returns whether it existed.
    pub fn remove(&self, seq: u64) -> Result<bool, MindtypeError> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let existed = {
            let mut table = write_txn.open_table(RECORDS).map_err(db_err)?;
            let removed = table.remove(seq).map_err(db_err)?;
            removed.is_some()
        };
        write_txn.commit().map_err(db_err)?;
        Ok(existed)
    }
}

impl RecordStore for RedbLogStore {
    fn name(&self) -> &str {
        "redb"
    }

    fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError> {
        self.push(record)?;
        Ok(AppendReceipt::Stored {
            backend: self.name().to_string(),
        })
    }

    fn count(&self) -> Result<usize, MindtypeError> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let table = read_txn.open_table(RECORDS).map_err(db_err)?;
        let len = table.len().map_err(db_err)?;
        usize::try_from(len).map_err(db_err)
    }

    fn export(&self) -> Result<Vec<u8>, MindtypeError> {
        let records: Vec<ParticipantRecord> =
            self.records()?.into_iter().map(|(_, r)| r).collect();
        export_csv(&records)
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

    fn record(id: &str, total: i64) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: ParticipantId::parse(id).expect("id"),
            age: 19,
            gender: Gender::PreferNotToSay,
            year_of_study: YearOfStudy::First,
            phq9_total: total,
            phq9_severity: Severity::Mild,
            depression_label: 0,
            phq9_items: [1, 1, 1, 1, 1, 0, 0, 0, 0],
            copy_task: TaskMetrics {
                duration_ms: 45_000,
                word_count: 20,
                char_count: 120,
                text: "The quick brown fox".to_string(),
            },
            free_writing: TaskMetrics::default(),
            collection_date: Timestamp::from_second(1_700_000_000).expect("ts"),
        }
    }

    #[test]
    fn records_round_trip_through_postcard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbLogStore::open(dir.path().join("log.redb")).expect("open");

        let original = record("REDB0001", 5);
        store.append(&original).expect("append");

        let stored = store.records().expect("records");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].1, original);
    }

    #[test]
    fn sequence_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("log.redb");

        {
            let store = RedbLogStore::open(&path).expect("open");
            assert_eq!(store.push(&record("REDB0001", 5)).expect("push"), 0);
            assert_eq!(store.push(&record("REDB0002", 6)).expect("push"), 1);
        }

        let store = RedbLogStore::open(&path).expect("reopen");
        assert_eq!(store.push(&record("REDB0003", 7)).expect("push"), 2);
        assert_eq!(store.count().expect("count"), 3);
    }

    #[test]
    fn remove_drops_one_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbLogStore::open(dir.path().join("log.redb")).expect("open");
        let seq = store.push(&record("REDB0001", 5)).expect("push");
        store.push(&record("REDB0002", 6)).expect("push");

        assert!(store.remove(seq).expect("remove"));
        assert!(!store.remove(seq).expect("remove again"));
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn export_renders_csv_with_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbLogStore::open(dir.path().join("log.redb")).expect("open");
        store.push(&record("REDB0001", 5)).expect("push");

        let text = String::from_utf8(store.export().expect("export")).expect("utf8");
        let mut lines = text.lines();
        assert!(lines.next().expect("header").starts_with("participant_id"));
        assert!(lines.next().expect("row").starts_with("REDB0001,19,Prefer not to say,1st,5,Mild,0"));
    }
}
