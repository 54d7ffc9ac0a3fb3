//! # Participant Record
//!
//! The flattened row appended to storage, one per completed session.
//!
//! Column order is fixed by [`COLUMNS`]; every backend writes exactly these
//! 25 columns in this order.

use crate::MindtypeError;
use crate::primitives::PHQ9_ITEM_COUNT;
use crate::scoring::{Severity, depression_label};
use crate::session::SessionState;
use crate::system::Stage;
use crate::types::{Gender, ParticipantId, TypingTask, YearOfStudy, format_seconds};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Header row, in storage order.
pub const COLUMNS: [&str; 25] = [
    "participant_id",
    "age",
    "gender",
    "year_of_study",
    "phq9_total",
    "phq9_severity",
    "depression_label",
    "phq9_q1",
    "phq9_q2",
    "phq9_q3",
    "phq9_q4",
    "phq9_q5",
    "phq9_q6",
    "phq9_q7",
    "phq9_q8",
    "phq9_q9",
    "copy_task_duration",
    "copy_task_word_count",
    "copy_task_char_count",
    "free_writing_duration",
    "free_writing_word_count",
    "free_writing_char_count",
    "copy_task_text",
    "free_writing_text",
    "collection_date",
];

/// Derived metrics for one typing task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub duration_ms: u64,
    pub word_count: usize,
    pub char_count: usize,
    pub text: String,
}

impl TaskMetrics {
    fn from_task(task: Option<&TypingTask>) -> Self {
        match task {
            Some(task) => Self {
                duration_ms: task.duration_ms,
                word_count: task.word_count(),
                char_count: task.char_count(),
                text: task.text_content.clone(),
            },
            None => Self::default(),
        }
    }

    /// Duration rendered as seconds with millisecond precision.
    #[must_use]
    pub fn duration_seconds(&self) -> String {
        format_seconds(self.duration_ms)
    }
}

/// One completed participant session, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub participant_id: ParticipantId,
    pub age: u8,
    pub gender: Gender,
    pub year_of_study: YearOfStudy,
    pub phq9_total: i64,
    pub phq9_severity: Severity,
    pub depression_label: u8,
    pub phq9_items: [u8; PHQ9_ITEM_COUNT],
    pub copy_task: TaskMetrics,
    pub free_writing: TaskMetrics,
    pub collection_date: Timestamp,
}

impl ParticipantRecord {
    /// Render the record as 25 string cells in [`COLUMNS`] order.
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(COLUMNS.len());
        row.push(self.participant_id.to_string());
        row.push(self.age.to_string());
        row.push(self.gender.label().to_string());
        row.push(self.year_of_study.label().to_string());
        row.push(self.phq9_total.to_string());
        row.push(self.phq9_severity.label().to_string());
        row.push(self.depression_label.to_string());
        row.extend(self.phq9_items.iter().map(|s| s.to_string()));
        row.push(self.copy_task.duration_seconds());
        row.push(self.copy_task.word_count.to_string());
        row.push(self.copy_task.char_count.to_string());
        row.push(self.free_writing.duration_seconds());
        row.push(self.free_writing.word_count.to_string());
        row.push(self.free_writing.char_count.to_string());
        row.push(self.copy_task.text.clone());
        row.push(self.free_writing.text.clone());
        row.push(self.collection_date.to_string());
        row
    }
}

/// Flatten a completed session into a record.
///
/// Reads the session without mutating it. Task slot 0 is the copy task and
/// slot 1 the free-writing task; a missing slot yields an empty transcript
/// and zero duration.
pub fn assemble(
    session: &SessionState,
    collection_date: Timestamp,
) -> Result<ParticipantRecord, MindtypeError> {
    if session.stage() != Stage::Complete {
        return Err(MindtypeError::InvalidTransition {
            stage: session.stage().name().to_string(),
            action: "assemble a record",
        });
    }

    let demographics = session
        .demographics()
        .ok_or_else(|| MindtypeError::Validation("demographics missing".to_string()))?;
    let phq9 = session
        .questionnaire()
        .ok_or_else(|| MindtypeError::Validation("questionnaire missing".to_string()))?;

    let tasks = session.tasks();

    Ok(ParticipantRecord {
        participant_id: demographics.participant_id.clone(),
        age: demographics.age,
        gender: demographics.gender,
        year_of_study: demographics.year_of_study,
        phq9_total: phq9.total_score,
        phq9_severity: phq9.severity,
        depression_label: depression_label(phq9.total_score),
        phq9_items: phq9.individual_scores,
        copy_task: TaskMetrics::from_task(tasks.first()),
        free_writing: TaskMetrics::from_task(tasks.get(1)),
        collection_date,
    })
}

// =============================================================================
// TESTS
// =============================================================================
