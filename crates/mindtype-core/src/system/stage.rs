//! # Wizard Stages
//!
//! The participant wizard is a strictly linear sequence of five stages.
//!
//! | Index | Stage         | Leaves when                               |
//! |-------|---------------|-------------------------------------------|
//! | 0     | Consent       | demographics complete and consent given   |
//! | 1     | Questionnaire | nine PHQ-9 answers submitted              |
//! | 2     | CopyTask      | copy transcript ≥ 50 chars completed      |
//! | 3     | FreeWriting   | free-writing transcript ≥ 50 chars        |
//! | 4     | Complete      | never (terminal; `close` resets)          |
//!
//! There are no branches and no backward transitions.

use crate::types::TaskKind;
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE ENUM
// =============================================================================

/// One step of the participant wizard.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Consent,
    Questionnaire,
    CopyTask,
    FreeWriting,
    Complete,
}

impl Stage {
    /// Every stage in order.
    pub const ALL: [Stage; 5] = [
        Stage::Consent,
        Stage::Questionnaire,
        Stage::CopyTask,
        Stage::FreeWriting,
        Stage::Complete,
    ];

    /// Human-readable stage name (as shown in the progress sidebar).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Consent => "Consent",
            Stage::Questionnaire => "PHQ-9",
            Stage::CopyTask => "Copy Task",
            Stage::FreeWriting => "Free Writing",
            Stage::Complete => "Complete",
        }
    }

    /// Zero-based position in the wizard.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Stage::Consent => 0,
            Stage::Questionnaire => 1,
            Stage::CopyTask => 2,
            Stage::FreeWriting => 3,
            Stage::Complete => 4,
        }
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Consent => Some(Stage::Questionnaire),
            Stage::Questionnaire => Some(Stage::CopyTask),
            Stage::CopyTask => Some(Stage::FreeWriting),
            Stage::FreeWriting => Some(Stage::Complete),
            Stage::Complete => None,
        }
    }

    /// The typing task administered in this stage, if it is a task stage.
    #[must_use]
    pub fn task_kind(&self) -> Option<TaskKind> {
        match self {
            Stage::CopyTask => Some(TaskKind::Copy),
            Stage::FreeWriting => Some(TaskKind::FreeWriting),
            _ => None,
        }
    }

    /// Check if this stage is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.index(), self.name())
    }
}

// =============================================================================
// PROGRESS READOUT
// =============================================================================

/// Display status of one stage relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Done,
    Current,
    Pending,
}

/// One row of the progress sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub stage: Stage,
    pub name: String,
    pub status: StageStatus,
}

/// Progress of every stage relative to `current`.
#[must_use]
pub fn progress(current: Stage) -> Vec<StageProgress> {
    Stage::ALL
        .iter()
        .map(|&stage| StageProgress {
            stage,
            name: stage.name().to_string(),
            status: match stage.cmp(&current) {
                std::cmp::Ordering::Less => StageStatus::Done,
                std::cmp::Ordering::Equal => StageStatus::Current,
                std::cmp::Ordering::Greater => StageStatus::Pending,
            },
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
