//! # mindtype-core
//!
//! The survey engine for Mindtype - THE LOGIC.
//!
//! This crate implements the study wizard: demographics and consent, PHQ-9
//! scoring, the two timed typing tasks, record assembly and the storage
//! drivers that persist one record per completed session.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Owns every participant entity through a per-session `SessionState`
//! - Moves forward only through explicit `Wizard` transitions
//! - Persists at most one record per session
//! - Has NO async, NO network dependencies (pure Rust)
//!
//! Presentation (terminal, HTTP) and the remote spreadsheet driver live in
//! the app crate.

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod export;
pub mod primitives;
pub mod record;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod system;
pub mod types;
pub mod wizard;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Demographics, DemographicsInput, Gender, MindtypeError, ParticipantId, TaskKind, TypingTask,
    YearOfStudy,
};

// =============================================================================
// RE-EXPORTS: Survey Engine
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use export::{export_checksum, export_csv};
pub use record::{COLUMNS, ParticipantRecord, TaskMetrics, assemble};
pub use scoring::{QuestionnaireResult, Severity, depression_label, interpret_phq9};
pub use session::{SaveOutcome, SessionState};
pub use wizard::{Advisory, LiveReadout, QuestionnaireOutcome, Wizard, WizardConfig};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use storage::{
    AppendReceipt, CsvFileStore, FallbackStore, RecordStore, RedbLogStore, ReplayReport,
};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{Stage, StageProgress, StageStatus, progress};
