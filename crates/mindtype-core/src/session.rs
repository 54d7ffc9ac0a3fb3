//! # Session Module
//!
//! Per-participant working memory.
//!
//! - One `SessionState` per participant, never shared
//! - Transient: nothing here is written to disk by the session itself
//! - Cleared on `close`, after which the participant starts again at Consent
//!
//! Only the wizard mutates a session; the record assembler reads it.

use crate::scoring::QuestionnaireResult;
use crate::system::Stage;
use crate::types::{Demographics, ParticipantId, TaskKind, TypingTask};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

// =============================================================================
// TASK CAPTURE
// =============================================================================

/// A typing task that has been started but not completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCapture {
    pub kind: TaskKind,
    pub start_time: Timestamp,
    /// Latest coalesced transcript.
    pub transcript: String,
}

// =============================================================================
// SAVE OUTCOME
// =============================================================================

/// Result of the single persistence attempt made on entering Complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The primary backend accepted the record.
    Saved { backend: String },
    /// The primary backend failed; the record is held in the local journal.
    Journaled { reason: String },
    /// Nothing could store the record.
    Failed { reason: String },
}

impl SaveOutcome {
    /// Whether the record is durably stored somewhere.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. } | SaveOutcome::Journaled { .. })
    }

    /// Message for the participant.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            SaveOutcome::Saved { .. } => "Your response has been saved successfully!".to_string(),
            SaveOutcome::Journaled { .. } => "Your response was stored locally and will be \
                uploaded later. No action is needed."
                .to_string(),
            SaveOutcome::Failed { reason } => format!(
                "Error saving data ({}). Please contact the researcher.",
                reason
            ),
        }
    }
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Mutable state of one participant's run through the wizard.
#[derive(Debug, Clone)]
pub struct SessionState {
    stage: Stage,
    participant_id: ParticipantId,
    demographics: Option<Demographics>,
    questionnaire: Option<QuestionnaireResult>,
    /// Completed tasks in completion order (copy first).
    tasks: Vec<TypingTask>,
    capture: Option<TaskCapture>,
    /// `Some` once the persistence attempt has been made.
    save_outcome: Option<SaveOutcome>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Create a fresh session at Consent with a newly generated participant id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_participant_id(ParticipantId::generate())
    }

    /// Create a fresh session with a known participant id.
    #[must_use]
    pub fn with_participant_id(participant_id: ParticipantId) -> Self {
        Self {
            stage: Stage::Consent,
            participant_id,
            demographics: None,
            questionnaire: None,
            tasks: Vec::new(),
            capture: None,
            save_outcome: None,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    #[must_use]
    pub fn demographics(&self) -> Option<&Demographics> {
        self.demographics.as_ref()
    }

    #[must_use]
    pub fn questionnaire(&self) -> Option<&QuestionnaireResult> {
        self.questionnaire.as_ref()
    }

    /// Completed tasks in completion order.
    #[must_use]
    pub fn tasks(&self) -> &[TypingTask] {
        &self.tasks
    }

    /// The completed task of the given kind, if any.
    #[must_use]
    pub fn task(&self, kind: TaskKind) -> Option<&TypingTask> {
        self.tasks.iter().find(|t| t.kind == kind)
    }

    /// The in-progress capture, if a task has been started.
    #[must_use]
    pub fn capture(&self) -> Option<&TaskCapture> {
        self.capture.as_ref()
    }

    /// Whether the task of the current stage has been started.
    #[must_use]
    pub fn task_started(&self) -> bool {
        self.capture.is_some()
    }

    /// Outcome of the persistence attempt, once made.
    #[must_use]
    pub fn save_outcome(&self) -> Option<&SaveOutcome> {
        self.save_outcome.as_ref()
    }

    /// Whether the record is durably stored.
    #[must_use]
    pub fn data_saved(&self) -> bool {
        self.save_outcome.as_ref().is_some_and(SaveOutcome::is_durable)
    }

    // =========================================================================
    // MUTATION (wizard only)
    // =========================================================================

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub(crate) fn set_demographics(&mut self, demographics: Demographics) {
        self.demographics = Some(demographics);
    }

    pub(crate) fn set_questionnaire(&mut self, result: QuestionnaireResult) {
        self.questionnaire = Some(result);
    }

    pub(crate) fn capture_mut(&mut self) -> Option<&mut TaskCapture> {
        self.capture.as_mut()
    }

    pub(crate) fn open_capture(&mut self, capture: TaskCapture) {
        self.capture = Some(capture);
    }

    pub(crate) fn take_capture(&mut self) -> Option<TaskCapture> {
        self.capture.take()
    }

    pub(crate) fn push_task(&mut self, task: TypingTask) {
        self.tasks.push(task);
    }

    pub(crate) fn set_save_outcome(&mut self, outcome: SaveOutcome) {
        self.save_outcome = Some(outcome);
    }

    /// Discard everything and start over with a new participant id.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

// =============================================================================
// TESTS
// =============================================================================
