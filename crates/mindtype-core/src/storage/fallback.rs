//! Primary store with a local redb journal.
//!
//! When the primary append fails the record goes to the journal instead, so a
//! completed session is never lost to a transient outage. [`FallbackStore::replay`]
//! later moves journaled records to the primary.

use super::redb_log::RedbLogStore;
use super::{AppendReceipt, RecordStore, log_warn};
use crate::MindtypeError;
use crate::export::participant_ids;
use crate::record::ParticipantRecord;
use std::sync::Arc;

/// Outcome of a journal replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records moved to the primary.
    pub replayed: usize,
    /// Records still in the journal.
    pub remaining: usize,
}

/// A primary store backed by a local journal.
pub struct FallbackStore {
    primary: Arc<dyn RecordStore>,
    journal: RedbLogStore,
}

impl std::fmt::Debug for FallbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStore")
            .field("primary", &self.primary.name())
            .field("journal", &self.journal)
            .finish()
    }
}

impl FallbackStore {
    #[must_use]
    pub fn new(primary: Arc<dyn RecordStore>, journal: RedbLogStore) -> Self {
        Self { primary, journal }
    }

    /// Number of records waiting in the journal.
    pub fn pending(&self) -> Result<usize, MindtypeError> {
        self.journal.count()
    }

    /// Move journaled records to the primary, oldest first.
    ///
    /// Stops at the first primary failure; that record and everything after
    /// it stays in the journal. A journaled record whose participant id the
    /// primary already holds (an earlier replay appended it but could not
    /// drop it from the journal) is dropped without appending again.
    pub fn replay(&self) -> Result<ReplayReport, MindtypeError> {
        let entries = self.journal.records()?;
        let total = entries.len();
        if total == 0 {
            return Ok(ReplayReport::default());
        }

        let mut stored = match self.primary.export().and_then(|data| participant_ids(&data)) {
            Ok(ids) => ids,
            Err(e) => {
                log_warn(
                    "fallback",
                    &format!("replay to {} stopped: {}", self.primary.name(), e),
                );
                return Ok(ReplayReport {
                    replayed: 0,
                    remaining: total,
                });
            }
        };

        let mut replayed = 0usize;
        for (seq, record) in entries {
            let id = record.participant_id.to_string();
            if !stored.contains(&id) {
                if let Err(e) = self.primary.append(&record) {
                    log_warn(
                        "fallback",
                        &format!("replay to {} stopped: {}", self.primary.name(), e),
                    );
                    break;
                }
                stored.insert(id);
            }
            self.journal.remove(seq)?;
            replayed = replayed.saturating_add(1);
        }

        Ok(ReplayReport {
            replayed,
            remaining: total.saturating_sub(replayed),
        })
    }
}

impl RecordStore for FallbackStore {
    fn name(&self) -> &str {
        self.primary.name()
    }

    fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError> {
        match self.primary.append(record) {
            Ok(receipt) => Ok(receipt),
            Err(primary_err) => {
                log_warn(
                    "fallback",
                    &format!(
                        "{} append failed, journaling {}: {}",
                        self.primary.name(),
                        record.participant_id,
                        primary_err
                    ),
                );
                self.journal.push(record).map_err(|journal_err| {
                    MindtypeError::Persistence(format!(
                        "{}; journal also failed: {}",
                        primary_err, journal_err
                    ))
                })?;
                Ok(AppendReceipt::Journaled {
                    reason: primary_err.to_string(),
                })
            }
        }
    }

    fn count(&self) -> Result<usize, MindtypeError> {
        self.primary.count()
    }

    fn export(&self) -> Result<Vec<u8>, MindtypeError> {
        self.primary.export()
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
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory primary that can be switched offline.
    #[derive(Default)]
    struct FlakyStore {
        offline: AtomicBool,
        rows: Mutex<Vec<ParticipantRecord>>,
    }

    impl RecordStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(MindtypeError::Persistence("offline".to_string()));
            }
            self.rows.lock().expect("lock").push(record.clone());
            Ok(AppendReceipt::Stored {
                backend: "flaky".to_string(),
            })
        }

        fn count(&self) -> Result<usize, MindtypeError> {
            Ok(self.rows.lock().expect("lock").len())
        }

        fn export(&self) -> Result<Vec<u8>, MindtypeError> {
            crate::export::export_csv(&self.rows.lock().expect("lock"))
        }
    }

    fn record(id: &str) -> ParticipantRecord {
        ParticipantRecord {
            participant_id: ParticipantId::parse(id).expect("id"),
            age: 20,
            gender: Gender::Male,
            year_of_study: YearOfStudy::Third,
            phq9_total: 0,
            phq9_severity: Severity::Minimal,
            depression_label: 0,
            phq9_items: [0; 9],
            copy_task: TaskMetrics::default(),
            free_writing: TaskMetrics::default(),
            collection_date: Timestamp::UNIX_EPOCH,
        }
    }

    fn setup() -> (tempfile::TempDir, Arc<FlakyStore>, FallbackStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let primary = Arc::new(FlakyStore::default());
        let journal = RedbLogStore::open(dir.path().join("journal.redb")).expect("journal");
        let store = FallbackStore::new(primary.clone(), journal);
        (dir, primary, store)
    }

    #[test]
    fn healthy_primary_stores_directly() {
        let (_dir, primary, store) = setup();
        let receipt = store.append(&record("FALL0001")).expect("append");
        assert!(matches!(receipt, AppendReceipt::Stored { .. }));
        assert_eq!(primary.count().expect("count"), 1);
        assert_eq!(store.pending().expect("pending"), 0);
    }

    #[test]
    fn failing_primary_journals_then_replays() {
        let (_dir, primary, store) = setup();
        primary.offline.store(true, Ordering::SeqCst);

        let receipt = store.append(&record("FALL0001")).expect("append");
        assert!(matches!(receipt, AppendReceipt::Journaled { .. }));
        assert_eq!(store.pending().expect("pending"), 1);

        let blocked = store.replay().expect("replay offline");
        assert_eq!(blocked, ReplayReport { replayed: 0, remaining: 1 });

        primary.offline.store(false, Ordering::SeqCst);
        let report = store.replay().expect("replay");
        assert_eq!(report, ReplayReport { replayed: 1, remaining: 0 });
        assert_eq!(primary.count().expect("count"), 1);
        assert_eq!(store.pending().expect("pending"), 0);
    }

    #[test]
    fn replay_skips_records_the_primary_already_holds() {
        let (_dir, primary, store) = setup();

        // Appended by an earlier replay whose journal removal failed.
        primary.append(&record("FALL0001")).expect("primary");
        store.journal.push(&record("FALL0001")).expect("journal");
        store.journal.push(&record("FALL0002")).expect("journal");

        let report = store.replay().expect("replay");
        assert_eq!(report, ReplayReport { replayed: 2, remaining: 0 });
        assert_eq!(primary.count().expect("count"), 2);
        assert_eq!(store.pending().expect("pending"), 0);

        let text = String::from_utf8(primary.export().expect("export")).expect("utf8");
        assert_eq!(text.matches("FALL0001").count(), 1);
    }

    #[test]
    fn name_reports_primary() {
        let (_dir, _primary, store) = setup();
        assert_eq!(store.name(), "flaky");
    }
}
