//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use super::sessions::SessionWizard;
use mindtype_core::{
    Advisory, Gender, LiveReadout, QuestionnaireOutcome, QuestionnaireResult, SaveOutcome, Stage,
    StageProgress, TaskKind, TypingTask, YearOfStudy,
    primitives::{
        COPY_TEXT, FREE_WRITING_PROMPT, MAX_AGE, MIN_TRANSCRIPT_CHARS, PHQ9_OPTIONS,
        PHQ9_QUESTIONS, PHQ9_STEM,
    },
    progress,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Machine-readable error kind (`validation`, `task_incomplete`, ...).
    pub kind: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: kind.to_string(),
            error: error.into(),
        }
    }
}

// =============================================================================
// INSTRUMENT
// =============================================================================

/// One PHQ-9 answer option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionJson {
    pub value: u8,
    pub label: String,
}

/// Static study content the front end renders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentResponse {
    pub phq9_stem: String,
    pub phq9_questions: Vec<String>,
    pub phq9_options: Vec<OptionJson>,
    pub copy_text: String,
    pub free_writing_prompt: String,
    pub min_transcript_chars: usize,
    pub genders: Vec<String>,
    pub years_of_study: Vec<String>,
    pub min_age: u8,
    pub max_age: u8,
}

impl InstrumentResponse {
    #[must_use]
    pub fn new(min_age: u8) -> Self {
        Self {
            phq9_stem: PHQ9_STEM.to_string(),
            phq9_questions: PHQ9_QUESTIONS.iter().map(|q| (*q).to_string()).collect(),
            phq9_options: PHQ9_OPTIONS
                .iter()
                .zip(0u8..)
                .map(|(label, value)| OptionJson {
                    value,
                    label: (*label).to_string(),
                })
                .collect(),
            copy_text: COPY_TEXT.to_string(),
            free_writing_prompt: FREE_WRITING_PROMPT.to_string(),
            min_transcript_chars: MIN_TRANSCRIPT_CHARS,
            genders: Gender::ALL.iter().map(|g| g.label().to_string()).collect(),
            years_of_study: YearOfStudy::ALL
                .iter()
                .map(|y| y.label().to_string())
                .collect(),
            min_age,
            max_age: MAX_AGE,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Returned by `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub participant_id: String,
    pub stage: Stage,
}

/// Snapshot of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub participant_id: String,
    pub stage: Stage,
    pub stage_name: String,
    pub progress: Vec<StageProgress>,
    pub task_started: bool,
    pub readout: Option<LiveReadout>,
    pub questionnaire: Option<QuestionnaireResult>,
    pub completed_tasks: Vec<TaskKind>,
    pub save: Option<FinishResponse>,
}

impl SessionResponse {
    #[must_use]
    pub fn from_wizard(wizard: &SessionWizard) -> Self {
        let session = wizard.session();
        Self {
            participant_id: session.participant_id().to_string(),
            stage: session.stage(),
            stage_name: session.stage().name().to_string(),
            progress: progress(session.stage()),
            task_started: session.task_started(),
            readout: wizard.live_readout().ok(),
            questionnaire: session.questionnaire().cloned(),
            completed_tasks: session.tasks().iter().map(|t| t.kind).collect(),
            save: session.save_outcome().cloned().map(FinishResponse::from),
        }
    }
}

// =============================================================================
// QUESTIONNAIRE
// =============================================================================

/// Body of `POST /session/questionnaire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireRequest {
    pub answers: Vec<u8>,
}

/// Advisory shown before the wizard moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryJson {
    pub kind: Advisory,
    pub message: String,
    pub pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionnaireResponse {
    pub result: QuestionnaireResult,
    pub depression_label: u8,
    pub advisory: Option<AdvisoryJson>,
    pub stage: Stage,
}

impl QuestionnaireResponse {
    #[must_use]
    pub fn new(outcome: QuestionnaireOutcome, pause_ms: u64, stage: Stage) -> Self {
        Self {
            depression_label: outcome.result.depression_label(),
            advisory: outcome.advisory.map(|kind| AdvisoryJson {
                kind,
                message: kind.message().to_string(),
                pause_ms,
            }),
            result: outcome.result,
            stage,
        }
    }
}

// =============================================================================
// TYPING TASKS
// =============================================================================

/// Body of `PUT /session/task/transcript`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRequest {
    pub text: String,
}

/// Returned by task start and transcript updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: TaskKind,
    pub stage: Stage,
    pub readout: LiveReadout,
}

/// Returned by `POST /session/task/complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTaskResponse {
    pub task: TaskKind,
    pub duration_seconds: String,
    pub word_count: usize,
    pub char_count: usize,
    pub stage: Stage,
}

impl CompletedTaskResponse {
    #[must_use]
    pub fn new(task: &TypingTask, stage: Stage) -> Self {
        Self {
            task: task.kind,
            duration_seconds: mindtype_core::types::format_seconds(task.duration_ms),
            word_count: task.word_count(),
            char_count: task.char_count(),
            stage,
        }
    }
}

// =============================================================================
// FINISH
// =============================================================================

/// Returned by `POST /session/finish`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishResponse {
    /// Whether the record is durably stored (primary or journal).
    pub saved: bool,
    pub outcome: SaveOutcome,
    pub message: String,
}

impl From<SaveOutcome> for FinishResponse {
    fn from(outcome: SaveOutcome) -> Self {
        Self {
            saved: outcome.is_durable(),
            message: outcome.message(),
            outcome,
        }
    }
}

// =============================================================================
// ADMIN
// =============================================================================

/// Returned by `GET /admin/count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub success: bool,
    pub backend: String,
    pub count: usize,
}

/// Returned by `GET /admin/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded CSV
    pub checksum: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}
