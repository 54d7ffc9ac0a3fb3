//! # PHQ-9 Scoring
//!
//! Pure scoring for the Patient Health Questionnaire.
//!
//! | Total   | Severity          |
//! |---------|-------------------|
//! | ≤ 4     | Minimal           |
//! | 5 – 9   | Mild              |
//! | 10 – 14 | Moderate          |
//! | 15 – 19 | Moderately Severe |
//! | ≥ 20    | Severe            |
//!
//! Negative totals are outside the instrument's domain and map to `Minimal`.

use crate::MindtypeError;
use crate::primitives::{
    DEPRESSION_LABEL_THRESHOLD, HIGH_DISTRESS_THRESHOLD, PHQ9_ITEM_COUNT, PHQ9_MAX_ITEM_SCORE,
};
use serde::{Deserialize, Serialize};

/// Severity bucket of a PHQ-9 total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minimal,
    Mild,
    Moderate,
    #[serde(rename = "Moderately Severe")]
    ModeratelySevere,
    Severe,
}

impl Severity {
    /// Label as stored in the record.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Minimal => "Minimal",
            Severity::Mild => "Mild",
            Severity::Moderate => "Moderate",
            Severity::ModeratelySevere => "Moderately Severe",
            Severity::Severe => "Severe",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a total score to its severity bucket.
#[must_use]
pub fn interpret_phq9(total_score: i64) -> Severity {
    if total_score <= 4 {
        Severity::Minimal
    } else if total_score <= 9 {
        Severity::Mild
    } else if total_score <= 14 {
        Severity::Moderate
    } else if total_score <= 19 {
        Severity::ModeratelySevere
    } else {
        Severity::Severe
    }
}

/// Binary label used by the study: 1 iff the total is at least 10.
#[must_use]
pub fn depression_label(total_score: i64) -> u8 {
    u8::from(total_score >= DEPRESSION_LABEL_THRESHOLD)
}

/// Scored questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireResult {
    /// One score per item, in item order.
    pub individual_scores: [u8; PHQ9_ITEM_COUNT],
    pub total_score: i64,
    pub severity: Severity,
}

impl QuestionnaireResult {
    /// Score a complete set of answers.
    ///
    /// Requires exactly nine answers, each in `0..=3`.
    pub fn from_answers(answers: &[u8]) -> Result<Self, MindtypeError> {
        let individual_scores: [u8; PHQ9_ITEM_COUNT] = answers.try_into().map_err(|_| {
            MindtypeError::Validation(format!(
                "expected {} answers, got {}",
                PHQ9_ITEM_COUNT,
                answers.len()
            ))
        })?;

        if let Some((idx, score)) = individual_scores
            .iter()
            .enumerate()
            .find(|(_, s)| **s > PHQ9_MAX_ITEM_SCORE)
        {
            return Err(MindtypeError::Validation(format!(
                "answer to item {} is {}, must be between 0 and {}",
                idx.saturating_add(1),
                score,
                PHQ9_MAX_ITEM_SCORE
            )));
        }

        let total_score = individual_scores.iter().map(|&s| i64::from(s)).sum();
        Ok(Self {
            individual_scores,
            total_score,
            severity: interpret_phq9(total_score),
        })
    }

    /// Binary depression label for this result.
    #[must_use]
    pub fn depression_label(&self) -> u8 {
        depression_label(self.total_score)
    }

    /// Whether the participant should see the high-distress advisory.
    #[must_use]
    pub fn is_high_distress(&self) -> bool {
        self.total_score >= HIGH_DISTRESS_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        let cases = [
            (0, Severity::Minimal),
            (4, Severity::Minimal),
            (5, Severity::Mild),
            (9, Severity::Mild),
            (10, Severity::Moderate),
            (14, Severity::Moderate),
            (15, Severity::ModeratelySevere),
            (19, Severity::ModeratelySevere),
            (20, Severity::Severe),
            (27, Severity::Severe),
        ];
        for (total, expected) in cases {
            assert_eq!(interpret_phq9(total), expected, "total {}", total);
        }
    }

    #[test]
    fn out_of_range_totals_still_classified() {
        assert_eq!(interpret_phq9(-3), Severity::Minimal);
        assert_eq!(interpret_phq9(i64::MIN), Severity::Minimal);
        assert_eq!(interpret_phq9(400), Severity::Severe);
    }

    #[test]
    fn labels_match_record_strings() {
        assert_eq!(Severity::ModeratelySevere.label(), "Moderately Severe");
        assert_eq!(format!("{}", Severity::Mild), "Mild");
    }

    #[test]
    fn from_answers_sums_items() {
        let result = QuestionnaireResult::from_answers(&[1, 1, 0, 2, 1, 0, 1, 0, 0]).expect("score");
        assert_eq!(result.total_score, 6);
        assert_eq!(result.severity, Severity::Mild);
        assert_eq!(result.depression_label(), 0);
        assert!(!result.is_high_distress());
    }

    #[test]
    fn from_answers_rejects_wrong_length() {
        let err = QuestionnaireResult::from_answers(&[0; 8]).expect_err("too few");
        assert!(matches!(err, MindtypeError::Validation(_)));
    }

    #[test]
    fn from_answers_rejects_item_above_three() {
        let err = QuestionnaireResult::from_answers(&[0, 0, 4, 0, 0, 0, 0, 0, 0]).expect_err("4");
        assert!(err.to_string().contains("item 3"));
    }

    #[test]
    fn label_threshold() {
        assert_eq!(depression_label(9), 0);
        assert_eq!(depression_label(10), 1);
    }
}
