//! # Storage Module
//!
//! Persistence boundary for completed participant records.
//!
//! Every driver implements [`RecordStore`]:
//! - `append` adds one fully assembled record (never a partial one)
//! - `count` and `export` serve researcher-facing retrieval
//!
//! ## Drivers
//!
//! - [`CsvFileStore`]: local CSV file, serialized single-writer append
//! - [`RedbLogStore`]: redb log-structured store (ACID, single writer)
//! - [`FallbackStore`]: primary driver plus a redb journal that keeps the
//!   record when the primary fails
//!
//! The remote spreadsheet driver lives in the app crate because it needs
//! network access.

mod csv_file;
mod fallback;
mod lock;
mod redb_log;

pub use csv_file::CsvFileStore;
pub use fallback::{FallbackStore, ReplayReport};
pub use lock::FileLock;
pub use redb_log::RedbLogStore;

use crate::MindtypeError;
use crate::record::ParticipantRecord;

/// What happened to an appended record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendReceipt {
    /// The named backend holds the record.
    Stored { backend: String },
    /// The primary backend failed; the local journal holds the record.
    Journaled { reason: String },
}

/// A durable, append-only destination for participant records.
///
/// Implementations must be safe to share between concurrent sessions and
/// must serialize their own writes.
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs and receipts.
    fn name(&self) -> &str;

    /// Append one record, writing the header first if the destination is empty.
    fn append(&self, record: &ParticipantRecord) -> Result<AppendReceipt, MindtypeError>;

    /// Number of data rows (header excluded).
    fn count(&self) -> Result<usize, MindtypeError>;

    /// The whole table as CSV bytes, header first.
    fn export(&self) -> Result<Vec<u8>, MindtypeError>;
}

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Emit a structured warning line on stderr.
///
/// The core carries no logging framework; the app layer redirects or
/// replaces stderr as needed.
fn log_warn(target: &str, message: &str) {
    eprintln!(
        "{{\"level\":\"warn\",\"target\":\"mindtype_core::storage::{}\",\"message\":{:?}}}",
        target, message
    );
}

/// Map an I/O error into the persistence taxonomy with context.
fn io_err(context: &str, e: impl std::fmt::Display) -> MindtypeError {
    MindtypeError::Io(format!("{}: {}", context, e))
}
