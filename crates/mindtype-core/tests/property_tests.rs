//! # Property-Based Tests
//!
//! Scoring and wizard invariants checked with proptest.

use mindtype_core::{
    DemographicsInput, Gender, ManualClock, QuestionnaireResult, Severity, Stage, Wizard,
    WizardConfig, YearOfStudy, assemble, depression_label, interpret_phq9,
};
use jiff::Timestamp;
use proptest::collection::vec;
use proptest::prelude::*;

fn gender() -> impl Strategy<Value = Gender> {
    prop::sample::select(Gender::ALL.to_vec())
}

fn year() -> impl Strategy<Value = YearOfStudy> {
    prop::sample::select(YearOfStudy::ALL.to_vec())
}

// =============================================================================
// SCORING
// =============================================================================

proptest! {
    /// Every total in range lands in exactly the documented bucket.
    #[test]
    fn severity_matches_bucket(total in 0i64..=27) {
        let expected = match total {
            0..=4 => Severity::Minimal,
            5..=9 => Severity::Mild,
            10..=14 => Severity::Moderate,
            15..=19 => Severity::ModeratelySevere,
            _ => Severity::Severe,
        };
        prop_assert_eq!(interpret_phq9(total), expected);
    }

    /// A higher total never maps to a lower severity.
    #[test]
    fn severity_is_monotone(a in -10i64..40, b in -10i64..40) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(interpret_phq9(lo) <= interpret_phq9(hi));
    }

    /// Label is 1 exactly from 10 upward.
    #[test]
    fn label_threshold(total in 0i64..=27) {
        prop_assert_eq!(depression_label(total), u8::from(total >= 10));
    }

    /// Valid answers always score to their sum, within 0..=27.
    #[test]
    fn answers_sum_to_total(answers in vec(0u8..=3, 9)) {
        let result = QuestionnaireResult::from_answers(&answers).expect("valid answers");
        let sum: i64 = answers.iter().map(|&a| i64::from(a)).sum();
        prop_assert_eq!(result.total_score, sum);
        prop_assert!((0..=27).contains(&result.total_score));
        prop_assert_eq!(result.severity, interpret_phq9(sum));
    }

    /// Any answer above 3 is rejected.
    #[test]
    fn out_of_range_answer_rejected(idx in 0usize..9, bad in 4u8..=u8::MAX) {
        let mut answers = [0u8; 9];
        answers[idx] = bad;
        prop_assert!(QuestionnaireResult::from_answers(&answers).is_err());
    }
}

// =============================================================================
// WIZARD
// =============================================================================

proptest! {
    /// The consent gate passes only with every field present and consent given.
    #[test]
    fn consent_gate_requires_every_field(
        age in prop::option::of(18u8..=100),
        gender in prop::option::of(gender()),
        year in prop::option::of(year()),
        consent in any::<bool>(),
    ) {
        let mut wizard = Wizard::new(ManualClock::at_epoch(), WizardConfig::default());
        let complete = age.is_some() && gender.is_some() && year.is_some() && consent;

        let result = wizard.submit_consent(DemographicsInput {
            age,
            gender,
            year_of_study: year,
            consent,
        });

        prop_assert_eq!(result.is_ok(), complete);
        let expected = if complete { Stage::Questionnaire } else { Stage::Consent };
        prop_assert_eq!(wizard.stage(), expected);
    }

    /// Assembling the same completed session twice differs only in the date.
    #[test]
    fn assembly_is_idempotent_except_date(
        answers in vec(0u8..=3, 9),
        copy_len in 50usize..400,
        free_len in 50usize..400,
        later in 1i64..1_000_000,
    ) {
        let clock = std::sync::Arc::new(ManualClock::at_epoch());
        let mut wizard = Wizard::new(clock.clone(), WizardConfig::default());
        wizard.submit_consent(DemographicsInput {
            age: Some(30),
            gender: Some(Gender::Other),
            year_of_study: Some(YearOfStudy::Fifth),
            consent: true,
        }).expect("consent");
        wizard.submit_questionnaire(&answers).expect("questionnaire");
        for len in [copy_len, free_len] {
            wizard.start_task().expect("start");
            wizard.update_transcript(&"k".repeat(len)).expect("update");
            wizard.complete_task().expect("complete");
        }

        let first = assemble(wizard.session(), Timestamp::UNIX_EPOCH).expect("first");
        let date = Timestamp::from_second(later).expect("ts");
        let mut second = assemble(wizard.session(), date).expect("second");

        prop_assert_eq!(second.collection_date, date);
        second.collection_date = first.collection_date;
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.copy_task.char_count, copy_len);
        prop_assert_eq!(first.free_writing.char_count, free_len);
    }
}
