//! # Core Type Definitions
//!
//! This module contains the value types shared across the Mindtype core:
//! - Participant identity (`ParticipantId`)
//! - Demographics (`Gender`, `YearOfStudy`, `DemographicsInput`, `Demographics`)
//! - Typing tasks (`TaskKind`, `TypingTask`)
//! - Error types (`MindtypeError`)
//!
//! ## Integer-Only Guarantees
//!
//! Durations are stored as whole milliseconds. Nothing in this module uses
//! floating-point arithmetic.

use crate::primitives::{PARTICIPANT_ID_ALPHABET, PARTICIPANT_ID_LENGTH};
use jiff::Timestamp;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// PARTICIPANT IDENTITY
// =============================================================================

/// Opaque participant identifier: 8 characters from `A-Z0-9`.
///
/// Generated once when a session is created and frozen when the consent
/// gate passes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..PARTICIPANT_ID_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..PARTICIPANT_ID_ALPHABET.len());
                char::from(PARTICIPANT_ID_ALPHABET[idx])
            })
            .collect();
        Self(id)
    }

    /// Wrap an existing identifier, validating its shape.
    pub fn parse(raw: &str) -> Result<Self, MindtypeError> {
        let valid = raw.len() == PARTICIPANT_ID_LENGTH
            && raw.bytes().all(|b| PARTICIPANT_ID_ALPHABET.contains(&b));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(MindtypeError::Validation(format!(
                "participant id must be {} characters from A-Z0-9",
                PARTICIPANT_ID_LENGTH
            )))
        }
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// DEMOGRAPHICS
// =============================================================================

/// Self-reported gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

impl Gender {
    /// All options in display order.
    pub const ALL: [Gender; 4] = [
        Gender::Male,
        Gender::Female,
        Gender::Other,
        Gender::PreferNotToSay,
    ];

    /// Label as stored in the record.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
            Gender::PreferNotToSay => "Prefer not to say",
        }
    }
}

impl FromStr for Gender {
    type Err = MindtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MindtypeError::Validation(format!("unknown gender option '{}'", wanted)))
    }
}

/// Ordinal year of study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum YearOfStudy {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th")]
    Fourth,
    #[serde(rename = "5th")]
    Fifth,
}

impl YearOfStudy {
    /// All options in ordinal order.
    pub const ALL: [YearOfStudy; 5] = [
        YearOfStudy::First,
        YearOfStudy::Second,
        YearOfStudy::Third,
        YearOfStudy::Fourth,
        YearOfStudy::Fifth,
    ];

    /// Label as stored in the record.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            YearOfStudy::First => "1st",
            YearOfStudy::Second => "2nd",
            YearOfStudy::Third => "3rd",
            YearOfStudy::Fourth => "4th",
            YearOfStudy::Fifth => "5th",
        }
    }
}

impl FromStr for YearOfStudy {
    type Err = MindtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|y| y.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                MindtypeError::Validation(format!("unknown year of study '{}'", wanted))
            })
    }
}

/// Demographics as entered on the consent screen, before validation.
///
/// Every field may still be empty; the consent gate decides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicsInput {
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub year_of_study: Option<YearOfStudy>,
    #[serde(default)]
    pub consent: bool,
}

/// Frozen demographics, produced once the consent gate passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub participant_id: ParticipantId,
    pub age: u8,
    pub gender: Gender,
    pub year_of_study: YearOfStudy,
    pub consent: bool,
    /// Instant the consent gate passed.
    pub timestamp: Timestamp,
}

// =============================================================================
// TYPING TASKS
// =============================================================================

/// The two typing tasks, in the order they are administered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Copy,
    FreeWriting,
}

impl TaskKind {
    /// Task name as recorded in the transcript log.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Copy => "copy_task",
            TaskKind::FreeWriting => "free_writing",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A finalized typing task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingTask {
    pub kind: TaskKind,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// `end_time - start_time` in whole milliseconds (0 if the clock went backwards).
    pub duration_ms: u64,
    /// Raw transcript, verbatim.
    pub text_content: String,
}

impl TypingTask {
    /// Build a task from its start/end instants, deriving the duration.
    #[must_use]
    pub fn new(
        kind: TaskKind,
        start_time: Timestamp,
        end_time: Timestamp,
        text_content: String,
    ) -> Self {
        Self {
            kind,
            start_time,
            end_time,
            duration_ms: elapsed_ms(start_time, end_time),
            text_content,
        }
    }

    /// Whitespace-delimited token count.
    #[must_use]
    pub fn word_count(&self) -> usize {
        word_count(&self.text_content)
    }

    /// Character count (Unicode scalar values).
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text_content.chars().count()
    }
}

/// Count whitespace-delimited tokens.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Whole milliseconds from `start` to `end`, saturating at zero.
#[must_use]
pub fn elapsed_ms(start: Timestamp, end: Timestamp) -> u64 {
    let span = end.duration_since(start);
    Duration::try_from(span)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Render milliseconds as seconds with millisecond precision (`45.000`).
#[must_use]
pub fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Mindtype system.
///
/// - No silent failures
/// - Use `Result<T, MindtypeError>` for fallible operations
/// - The core never panics; every error leaves the wizard where it was
#[derive(Debug, Error)]
pub enum MindtypeError {
    /// A required field is missing or out of range at a stage gate.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A typing task transcript is below the minimum length.
    #[error("Task {kind} incomplete: {chars} characters typed, {required} required")]
    TaskIncomplete {
        kind: TaskKind,
        chars: usize,
        required: usize,
    },

    /// The requested action is not available in the current stage.
    #[error("Cannot {action} during stage {stage}")]
    InvalidTransition { stage: String, action: &'static str },

    /// The storage backend could not persist the record.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MindtypeError {
    /// Whether the participant can fix this by correcting input and retrying.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MindtypeError::Validation(_)
                | MindtypeError::TaskIncomplete { .. }
                | MindtypeError::InvalidTransition { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_id_shape() {
        for _ in 0..50 {
            let id = ParticipantId::generate();
            assert_eq!(id.as_str().len(), PARTICIPANT_ID_LENGTH);
            assert!(
                id.as_str()
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
            );
        }
    }

    #[test]
    fn participant_id_parse_rejects_lowercase() {
        assert!(ParticipantId::parse("AB12CD34").is_ok());
        assert!(ParticipantId::parse("ab12cd34").is_err());
        assert!(ParticipantId::parse("AB12").is_err());
    }

    #[test]
    fn gender_parses_labels() {
        assert_eq!("female".parse::<Gender>().expect("parse"), Gender::Female);
        assert_eq!(
            "Prefer not to say".parse::<Gender>().expect("parse"),
            Gender::PreferNotToSay
        );
        assert!("".parse::<Gender>().is_err());
    }

    #[test]
    fn year_uses_ordinal_labels() {
        assert_eq!(YearOfStudy::Second.label(), "2nd");
        assert_eq!("3RD".parse::<YearOfStudy>().expect("parse"), YearOfStudy::Third);
        assert!(YearOfStudy::First < YearOfStudy::Fifth);
    }

    #[test]
    fn word_and_char_counts() {
        let start = Timestamp::UNIX_EPOCH;
        let task = TypingTask::new(TaskKind::Copy, start, start, "héllo  wörld\n again ".into());
        assert_eq!(task.word_count(), 3);
        assert_eq!(task.char_count(), 20);
    }

    #[test]
    fn duration_saturates_when_clock_goes_backwards() {
        let start = Timestamp::from_second(100).expect("ts");
        let end = Timestamp::from_second(90).expect("ts");
        assert_eq!(elapsed_ms(start, end), 0);
        assert_eq!(elapsed_ms(end, start), 10_000);
    }

    #[test]
    fn format_seconds_pads_millis() {
        assert_eq!(format_seconds(45_000), "45.000");
        assert_eq!(format_seconds(1_005), "1.005");
        assert_eq!(format_seconds(0), "0.000");
    }
}
