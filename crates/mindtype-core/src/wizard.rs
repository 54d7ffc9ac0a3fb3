//! # Wizard
//!
//! The stage controller: one `Wizard` drives one participant through
//! Consent → PHQ-9 → Copy Task → Free Writing → Complete.
//!
//! Every operation checks the current stage first. An operation called in
//! the wrong stage, or with input that fails its gate, returns an error and
//! leaves the session exactly as it was. Stages only move forward; the one
//! way back is [`Wizard::close`], which starts a fresh session.
//!
//! The wizard performs at most one storage append per session. Once
//! [`Wizard::finish`] has made the attempt, its outcome is remembered and
//! returned on every later call.

use crate::MindtypeError;
use crate::clock::{Clock, SystemClock};
use crate::primitives::{
    ADVISORY_PAUSE, DEFAULT_MIN_AGE, HIGH_DISTRESS_MESSAGE, MAX_AGE, MAX_TRANSCRIPT_LENGTH,
    MIN_TRANSCRIPT_CHARS,
};
use crate::record::assemble;
use crate::scoring::QuestionnaireResult;
use crate::session::{SaveOutcome, SessionState, TaskCapture};
use crate::storage::{AppendReceipt, RecordStore};
use crate::system::Stage;
use crate::types::{Demographics, DemographicsInput, TaskKind, TypingTask, elapsed_ms, word_count};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tunables of the stage controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardConfig {
    /// Youngest age the consent gate accepts.
    pub min_age: u8,
    /// How long the high-distress advisory holds the wizard.
    pub advisory_pause: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            min_age: DEFAULT_MIN_AGE,
            advisory_pause: ADVISORY_PAUSE,
        }
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// A notice shown to the participant before the wizard moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// PHQ-9 total at or above the high-distress threshold.
    HighDistress,
}

impl Advisory {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Advisory::HighDistress => HIGH_DISTRESS_MESSAGE,
        }
    }
}

/// Result of a successful questionnaire submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireOutcome {
    pub result: QuestionnaireResult,
    pub advisory: Option<Advisory>,
}

/// Cosmetic progress shown while a task is being typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveReadout {
    pub word_count: usize,
    /// Elapsed time as `m:ss`; free writing only.
    pub elapsed: Option<String>,
}

// =============================================================================
// WIZARD
// =============================================================================

/// Stage-transition state machine over one participant session.
#[derive(Debug)]
pub struct Wizard<C: Clock = SystemClock> {
    session: SessionState,
    clock: C,
    config: WizardConfig,
}

impl Wizard<SystemClock> {
    /// A wizard on the wall clock with default tunables.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemClock, WizardConfig::default())
    }
}

impl<C: Clock> Wizard<C> {
    /// Start a fresh session.
    #[must_use]
    pub fn new(clock: C, config: WizardConfig) -> Self {
        Self {
            session: SessionState::new(),
            clock,
            config,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.session.stage()
    }

    #[must_use]
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Consent gate.
    ///
    /// Requires age within `[min_age, 100]`, gender, year of study and an
    /// explicit consent. Stamps the demographics and advances to PHQ-9.
    pub fn submit_consent(&mut self, input: DemographicsInput) -> Result<(), MindtypeError> {
        self.require(Stage::Consent, "submit consent")?;

        let mut missing = Vec::new();
        if input.age.is_none() {
            missing.push("age");
        }
        if input.gender.is_none() {
            missing.push("gender");
        }
        if input.year_of_study.is_none() {
            missing.push("year_of_study");
        }
        if !input.consent {
            missing.push("consent");
        }

        let (Some(age), Some(gender), Some(year_of_study), true) =
            (input.age, input.gender, input.year_of_study, input.consent)
        else {
            return Err(MindtypeError::Validation(format!(
                "please complete all fields and provide consent (missing: {})",
                missing.join(", ")
            )));
        };

        if age < self.config.min_age || age > MAX_AGE {
            return Err(MindtypeError::Validation(format!(
                "age must be between {} and {}, got {}",
                self.config.min_age, MAX_AGE, age
            )));
        }

        let demographics = Demographics {
            participant_id: self.session.participant_id().clone(),
            age,
            gender,
            year_of_study,
            consent: true,
            timestamp: self.clock.now(),
        };
        self.session.set_demographics(demographics);
        self.advance();
        Ok(())
    }

    /// Questionnaire gate.
    ///
    /// Scores the nine answers. At a total of 20 or more the high-distress
    /// advisory is returned and the wizard holds for `advisory_pause`
    /// before advancing.
    pub fn submit_questionnaire(
        &mut self,
        answers: &[u8],
    ) -> Result<QuestionnaireOutcome, MindtypeError> {
        self.require(Stage::Questionnaire, "submit the questionnaire")?;

        let result = QuestionnaireResult::from_answers(answers)?;
        let advisory = result.is_high_distress().then_some(Advisory::HighDistress);

        self.session.set_questionnaire(result.clone());
        if advisory.is_some() {
            self.clock.pause(self.config.advisory_pause);
        }
        self.advance();

        Ok(QuestionnaireOutcome { result, advisory })
    }

    /// Start the typing task of the current stage.
    ///
    /// Starting an already started task keeps the original start instant.
    pub fn start_task(&mut self) -> Result<TaskKind, MindtypeError> {
        let kind = self.current_task("start a task")?;
        if !self.session.task_started() {
            self.session.open_capture(TaskCapture {
                kind,
                start_time: self.clock.now(),
                transcript: String::new(),
            });
        }
        Ok(kind)
    }

    /// Replace the live transcript of the started task.
    pub fn update_transcript(&mut self, text: &str) -> Result<(), MindtypeError> {
        let kind = self.current_task("type a transcript")?;
        if text.len() > MAX_TRANSCRIPT_LENGTH {
            return Err(MindtypeError::Validation(format!(
                "transcript is {} bytes, maximum is {}",
                text.len(),
                MAX_TRANSCRIPT_LENGTH
            )));
        }
        let capture = self.session.capture_mut().ok_or(MindtypeError::TaskIncomplete {
            kind,
            chars: 0,
            required: MIN_TRANSCRIPT_CHARS,
        })?;
        capture.transcript.clear();
        capture.transcript.push_str(text);
        Ok(())
    }

    /// Word count and, for free writing, elapsed time of the started task.
    pub fn live_readout(&self) -> Result<LiveReadout, MindtypeError> {
        let kind = self.current_task("read task progress")?;
        let Some(capture) = self.session.capture() else {
            return Ok(LiveReadout {
                word_count: 0,
                elapsed: None,
            });
        };

        let elapsed = match kind {
            TaskKind::FreeWriting => {
                let secs = elapsed_ms(capture.start_time, self.clock.now()) / 1000;
                Some(format!("{}:{:02}", secs / 60, secs % 60))
            }
            TaskKind::Copy => None,
        };

        Ok(LiveReadout {
            word_count: word_count(&capture.transcript),
            elapsed,
        })
    }

    /// Finalize the started task and advance.
    ///
    /// The trimmed transcript must have at least 50 characters; the stored
    /// text is the transcript verbatim.
    pub fn complete_task(&mut self) -> Result<&TypingTask, MindtypeError> {
        let kind = self.current_task("complete a task")?;

        let chars = self
            .session
            .capture()
            .map(|c| c.transcript.trim().chars().count())
            .unwrap_or(0);
        if !self.session.task_started() || chars < MIN_TRANSCRIPT_CHARS {
            return Err(MindtypeError::TaskIncomplete {
                kind,
                chars,
                required: MIN_TRANSCRIPT_CHARS,
            });
        }

        let capture = self
            .session
            .take_capture()
            .ok_or(MindtypeError::TaskIncomplete {
                kind,
                chars,
                required: MIN_TRANSCRIPT_CHARS,
            })?;
        let end_time = self.clock.now();
        self.session.push_task(TypingTask::new(
            capture.kind,
            capture.start_time,
            end_time,
            capture.transcript,
        ));
        self.advance();

        self.session
            .task(kind)
            .ok_or_else(|| MindtypeError::Validation(format!("{} was not recorded", kind)))
    }

    /// Persist the completed session, at most once.
    ///
    /// The first call assembles the record and appends it to `store`. Every
    /// later call returns the remembered outcome without touching storage,
    /// including after a failed attempt.
    pub fn finish(&mut self, store: &dyn RecordStore) -> Result<SaveOutcome, MindtypeError> {
        self.require(Stage::Complete, "save the record")?;

        if let Some(outcome) = self.session.save_outcome() {
            return Ok(outcome.clone());
        }

        let outcome = match assemble(&self.session, self.clock.now())
            .and_then(|record| store.append(&record))
        {
            Ok(AppendReceipt::Stored { backend }) => SaveOutcome::Saved { backend },
            Ok(AppendReceipt::Journaled { reason }) => SaveOutcome::Journaled { reason },
            Err(e) => SaveOutcome::Failed {
                reason: e.to_string(),
            },
        };

        self.session.set_save_outcome(outcome.clone());
        Ok(outcome)
    }

    /// Discard the session; the next interaction starts at Consent.
    pub fn close(&mut self) {
        self.session.clear();
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn require(&self, stage: Stage, action: &'static str) -> Result<(), MindtypeError> {
        if self.session.stage() == stage {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn current_task(&self, action: &'static str) -> Result<TaskKind, MindtypeError> {
        self.session
            .stage()
            .task_kind()
            .ok_or_else(|| self.invalid(action))
    }

    fn invalid(&self, action: &'static str) -> MindtypeError {
        MindtypeError::InvalidTransition {
            stage: self.session.stage().name().to_string(),
            action,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.session.stage().next() {
            self.session.set_stage(next);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{Gender, YearOfStudy};
    use std::sync::Arc;

    fn wizard() -> (Arc<ManualClock>, Wizard<Arc<ManualClock>>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let wizard = Wizard::new(Arc::clone(&clock), WizardConfig::default());
        (clock, wizard)
    }

    fn consent() -> DemographicsInput {
        DemographicsInput {
            age: Some(21),
            gender: Some(Gender::Female),
            year_of_study: Some(YearOfStudy::Second),
            consent: true,
        }
    }

    #[test]
    fn consent_lists_missing_fields() {
        let (_, mut wizard) = wizard();
        let err = wizard
            .submit_consent(DemographicsInput {
                age: Some(21),
                ..Default::default()
            })
            .expect_err("incomplete");
        let message = err.to_string();
        assert!(message.contains("gender"));
        assert!(message.contains("year_of_study"));
        assert!(message.contains("consent"));
        assert!(!message.contains("age,"));
        assert_eq!(wizard.stage(), Stage::Consent);
    }

    #[test]
    fn consent_enforces_age_range() {
        let (_, mut wizard) = wizard();
        for age in [17u8, 101] {
            let err = wizard
                .submit_consent(DemographicsInput {
                    age: Some(age),
                    ..consent()
                })
                .expect_err("out of range");
            assert!(matches!(err, MindtypeError::Validation(_)));
        }
        assert_eq!(wizard.stage(), Stage::Consent);
        wizard.submit_consent(consent()).expect("valid");
        assert_eq!(wizard.stage(), Stage::Questionnaire);
    }

    #[test]
    fn min_age_is_configurable() {
        let clock = ManualClock::at_epoch();
        let mut wizard = Wizard::new(
            clock,
            WizardConfig {
                min_age: 16,
                ..WizardConfig::default()
            },
        );
        wizard
            .submit_consent(DemographicsInput {
                age: Some(16),
                ..consent()
            })
            .expect("16 allowed");
    }

    #[test]
    fn demographics_keep_session_participant_id() {
        let (_, mut wizard) = wizard();
        let id = wizard.session().participant_id().clone();
        wizard.submit_consent(consent()).expect("consent");
        let demographics = wizard.session().demographics().expect("stored");
        assert_eq!(demographics.participant_id, id);
    }

    #[test]
    fn wrong_stage_is_rejected_without_change() {
        let (_, mut wizard) = wizard();
        let err = wizard
            .submit_questionnaire(&[0; 9])
            .expect_err("not yet");
        assert!(matches!(err, MindtypeError::InvalidTransition { .. }));
        assert!(wizard.start_task().is_err());
        assert!(wizard.live_readout().is_err());
        assert_eq!(wizard.stage(), Stage::Consent);
    }

    #[test]
    fn advisory_only_at_twenty_or_more() {
        let (clock, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        let outcome = wizard
            .submit_questionnaire(&[3, 3, 3, 3, 3, 3, 1, 0, 0])
            .expect("score");
        assert_eq!(outcome.result.total_score, 19);
        assert!(outcome.advisory.is_none());
        assert!(clock.pauses().is_empty());
    }

    #[test]
    fn start_task_twice_keeps_first_instant() {
        let (clock, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.submit_questionnaire(&[0; 9]).expect("score");

        wizard.start_task().expect("start");
        let first = wizard.session().capture().expect("capture").start_time;
        clock.advance(Duration::from_secs(5));
        wizard.start_task().expect("restart");
        assert_eq!(wizard.session().capture().expect("capture").start_time, first);
    }

    #[test]
    fn transcript_requires_started_task() {
        let (_, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.submit_questionnaire(&[0; 9]).expect("score");
        let err = wizard.update_transcript("hello").expect_err("not started");
        assert!(matches!(err, MindtypeError::TaskIncomplete { .. }));
    }

    #[test]
    fn oversized_transcript_is_rejected() {
        let (_, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.submit_questionnaire(&[0; 9]).expect("score");
        wizard.start_task().expect("start");
        let huge = "x".repeat(MAX_TRANSCRIPT_LENGTH + 1);
        assert!(wizard.update_transcript(&huge).is_err());
        assert_eq!(wizard.session().capture().expect("capture").transcript, "");
    }

    #[test]
    fn whitespace_does_not_count_toward_minimum() {
        let (_, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.submit_questionnaire(&[0; 9]).expect("score");
        wizard.start_task().expect("start");
        let padded = format!("   {}   ", "a".repeat(49));
        wizard.update_transcript(&padded).expect("update");
        let err = wizard.complete_task().expect_err("49 trimmed");
        assert!(matches!(
            err,
            MindtypeError::TaskIncomplete { chars: 49, required: 50, .. }
        ));
        assert_eq!(wizard.stage(), Stage::CopyTask);
        assert!(wizard.session().task_started());
    }

    #[test]
    fn free_writing_readout_shows_elapsed() {
        let (clock, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.submit_questionnaire(&[0; 9]).expect("score");
        wizard.start_task().expect("start copy");
        wizard.update_transcript(&"c".repeat(60)).expect("update");
        wizard.complete_task().expect("complete copy");

        wizard.start_task().expect("start free");
        wizard.update_transcript("one two three").expect("update");
        clock.advance(Duration::from_secs(210));

        let readout = wizard.live_readout().expect("readout");
        assert_eq!(readout.word_count, 3);
        assert_eq!(readout.elapsed.as_deref(), Some("3:30"));
    }

    #[test]
    fn close_returns_to_consent() {
        let (_, mut wizard) = wizard();
        wizard.submit_consent(consent()).expect("consent");
        wizard.close();
        assert_eq!(wizard.stage(), Stage::Consent);
        assert!(wizard.session().demographics().is_none());
    }
}
