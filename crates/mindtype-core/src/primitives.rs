//! # Study Primitives
//!
//! Fixed constants for the Mindtype study instrument.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! The only tunables (age floor, advisory pause) live in `WizardConfig`,
//! which defaults to the values below.

use std::time::Duration;

// =============================================================================
// PARTICIPANT IDENTITY
// =============================================================================

/// Length of the generated participant identifier.
pub const PARTICIPANT_ID_LENGTH: usize = 8;

/// Alphabet used for participant identifiers (uppercase letters and digits).
pub const PARTICIPANT_ID_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// =============================================================================
// DEMOGRAPHICS BOUNDS
// =============================================================================

/// Default minimum participant age.
///
/// One canonical floor for every deployment; override through `WizardConfig`.
pub const DEFAULT_MIN_AGE: u8 = 18;

/// Maximum participant age accepted by the consent gate.
pub const MAX_AGE: u8 = 100;

// =============================================================================
// PHQ-9
// =============================================================================

/// Number of PHQ-9 items.
pub const PHQ9_ITEM_COUNT: usize = 9;

/// Highest score a single PHQ-9 item can take ("Nearly every day").
pub const PHQ9_MAX_ITEM_SCORE: u8 = 3;

/// Total score at or above which `depression_label` is 1.
pub const DEPRESSION_LABEL_THRESHOLD: i64 = 10;

/// Total score at or above which the high-distress advisory is shown.
pub const HIGH_DISTRESS_THRESHOLD: i64 = 20;

/// Mandatory pause after the high-distress advisory.
pub const ADVISORY_PAUSE: Duration = Duration::from_secs(3);

/// PHQ-9 item wording, in order.
pub const PHQ9_QUESTIONS: [&str; PHQ9_ITEM_COUNT] = [
    "Little interest or pleasure in doing things",
    "Feeling down, depressed, or hopeless",
    "Trouble falling or staying asleep, or sleeping too much",
    "Feeling tired or having little energy",
    "Poor appetite or overeating",
    "Feeling bad about yourself or that you are a failure",
    "Trouble concentrating on things",
    "Moving or speaking slowly, or being fidgety/restless",
    "Thoughts that you would be better off dead or hurting yourself",
];

/// Answer options shared by all PHQ-9 items; the index is the score.
pub const PHQ9_OPTIONS: [&str; 4] = [
    "Not at all",
    "Several days",
    "More than half the days",
    "Nearly every day",
];

/// Stem shown above the questionnaire.
pub const PHQ9_STEM: &str =
    "Over the last 2 weeks, how often have you been bothered by the following problems?";

/// Advisory shown when the total score reaches `HIGH_DISTRESS_THRESHOLD`.
pub const HIGH_DISTRESS_MESSAGE: &str = "Your responses indicate you may be experiencing \
significant distress. Please consider speaking with a mental health professional. \
Resources will be provided at the end of this study.";

// =============================================================================
// TYPING TASKS
// =============================================================================

/// Minimum trimmed transcript length (in characters) to complete a task.
pub const MIN_TRANSCRIPT_CHARS: usize = 50;

/// Maximum transcript length in bytes.
///
/// Transcripts longer than this (64KB) are rejected at capture time.
pub const MAX_TRANSCRIPT_LENGTH: usize = 65536;

/// Reference text for the copy task.
pub const COPY_TEXT: &str = "The quick brown fox jumps over the lazy dog. Mental health is an \
important aspect of overall well-being. University students often face unique challenges \
including academic pressure, social adjustments, and future uncertainties. It is essential to \
recognize signs of distress early and seek appropriate support when needed.";

/// Prompt for the free-writing task.
pub const FREE_WRITING_PROMPT: &str = "Please write about your typical day as a university \
student. Describe your daily routine, activities, and how you generally feel. Write naturally \
for 3-4 minutes.";
