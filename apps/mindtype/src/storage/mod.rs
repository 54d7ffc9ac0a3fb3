//! # Storage Selection
//!
//! Opens the configured backend and, unless disabled, wraps it with the
//! local fallback journal.

mod sheet;

pub use sheet::SheetStore;

use crate::config::{Backend, StorageConfig};
use mindtype_core::{CsvFileStore, FallbackStore, MindtypeError, RecordStore, RedbLogStore};
use std::sync::Arc;

/// The opened storage stack.
#[derive(Clone)]
pub struct Storage {
    primary: Arc<dyn RecordStore>,
    fallback: Option<Arc<FallbackStore>>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Storage {
    /// Open the backend described by `config`, with its fallback journal.
    ///
    /// A redb primary is already a local ACID log, so it is never journaled.
    /// redb admits one opener per file, so only writers (`server`, `run`,
    /// `flush`) open the journal.
    pub fn open(config: &StorageConfig) -> Result<Self, MindtypeError> {
        let primary = open_primary(config)?;

        let fallback = match (&config.journal, config.backend) {
            (Some(path), Backend::Csv | Backend::Sheet) => {
                let journal = RedbLogStore::open(path)?;
                tracing::info!("Fallback journal at {:?}", path);
                Some(Arc::new(FallbackStore::new(Arc::clone(&primary), journal)))
            }
            _ => None,
        };

        Ok(Self { primary, fallback })
    }

    /// Open only the primary backend, for read-only researcher commands.
    ///
    /// Leaves the journal alone so `count` and `export` work while a server
    /// holds it.
    pub fn open_readonly(config: &StorageConfig) -> Result<Self, MindtypeError> {
        Ok(Self {
            primary: open_primary(config)?,
            fallback: None,
        })
    }

    /// The store sessions write to: the fallback wrapper when present.
    #[must_use]
    pub fn record_store(&self) -> Arc<dyn RecordStore> {
        match &self.fallback {
            Some(fallback) => Arc::clone(fallback) as Arc<dyn RecordStore>,
            None => Arc::clone(&self.primary),
        }
    }

    /// The fallback journal wrapper, if enabled.
    #[must_use]
    pub fn fallback(&self) -> Option<&FallbackStore> {
        self.fallback.as_deref()
    }

    /// Name of the primary backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.primary.name()
    }
}

fn open_primary(config: &StorageConfig) -> Result<Arc<dyn RecordStore>, MindtypeError> {
    Ok(match config.backend {
        Backend::Csv => Arc::new(CsvFileStore::new(&config.data)),
        Backend::Redb => Arc::new(RedbLogStore::open(&config.data)?),
        Backend::Sheet => {
            if !config.sheet.is_configured() {
                return Err(MindtypeError::Config(
                    "sheet backend needs storage.sheet.id and a token \
                     (MINDTYPE_SHEET_ID / MINDTYPE_SHEET_TOKEN)"
                        .to_string(),
                ));
            }
            Arc::new(SheetStore::new(&config.sheet)?)
        }
    })
}

/// Records waiting in the journal, or `None` without one.
///
/// The journal is opened briefly; while another process holds it the count
/// is unknown and `None` is returned as well.
pub fn journal_pending(config: &StorageConfig) -> Option<usize> {
    let path = match (&config.journal, config.backend) {
        (Some(path), Backend::Csv | Backend::Sheet) => path,
        _ => return None,
    };
    if !path.exists() {
        return Some(0);
    }
    match RedbLogStore::open(path).and_then(|journal| journal.count()) {
        Ok(pending) => Some(pending),
        Err(e) => {
            tracing::debug!("Journal {:?} not readable: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_backend_gets_a_journal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            data: dir.path().join("responses.csv"),
            journal: Some(dir.path().join("journal.redb")),
            ..StorageConfig::default()
        };
        let storage = Storage::open(&config).expect("open");
        assert_eq!(storage.backend_name(), "csv");
        assert!(storage.fallback().is_some());
        assert_eq!(storage.record_store().name(), "csv");
    }

    #[test]
    fn redb_backend_is_not_journaled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            backend: Backend::Redb,
            data: dir.path().join("responses.redb"),
            journal: Some(dir.path().join("journal.redb")),
            ..StorageConfig::default()
        };
        let storage = Storage::open(&config).expect("open");
        assert!(storage.fallback().is_none());
        assert_eq!(storage.backend_name(), "redb");
    }

    #[test]
    fn readonly_open_works_while_journal_is_held() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StorageConfig {
            data: dir.path().join("responses.csv"),
            journal: Some(dir.path().join("journal.redb")),
            ..StorageConfig::default()
        };
        let writer = Storage::open(&config).expect("writer");
        assert!(Storage::open(&config).is_err());

        let reader = Storage::open_readonly(&config).expect("reader");
        assert!(reader.fallback().is_none());
        assert_eq!(reader.record_store().count().expect("count"), 0);
        assert!(reader.record_store().export().expect("export").starts_with(b"participant_id,"));

        assert_eq!(journal_pending(&config), None);
        drop(writer);
        assert_eq!(journal_pending(&config), Some(0));
    }

    #[test]
    fn journal_pending_without_journal_is_none() {
        let config = StorageConfig {
            journal: None,
            ..StorageConfig::default()
        };
        assert_eq!(journal_pending(&config), None);
    }

    #[test]
    fn sheet_backend_requires_credentials() {
        let config = StorageConfig {
            backend: Backend::Sheet,
            journal: None,
            ..StorageConfig::default()
        };
        let err = Storage::open(&config).expect_err("no credentials");
        assert!(matches!(err, MindtypeError::Config(_)));
    }
}
