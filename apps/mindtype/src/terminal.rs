//! # Terminal Wizard
//!
//! Runs one participant through the study on a line-oriented terminal:
//! consent, PHQ-9, copy task, free writing, save.
//!
//! Each gate re-prompts until the wizard accepts the input. Typing tasks
//! read lines until a line holding only `.`; lines keep accumulating if the
//! transcript is still too short.

use mindtype_core::{
    Advisory, Clock, DemographicsInput, Gender, MindtypeError, QuestionnaireResult, RecordStore,
    SaveOutcome, TaskKind, Wizard, YearOfStudy,
    primitives::{
        COPY_TEXT, FREE_WRITING_PROMPT, MAX_AGE, MIN_TRANSCRIPT_CHARS, PHQ9_OPTIONS,
        PHQ9_QUESTIONS, PHQ9_STEM,
    },
    types::format_seconds,
};
use std::io::{BufRead, Write};

/// Line that ends a typing task.
const END_OF_TASK: &str = ".";

/// Drive `wizard` from `input` to a saved record.
///
/// Returns the save outcome; an exhausted `input` is an I/O error.
pub fn run_wizard<C, R, W>(
    wizard: &mut Wizard<C>,
    store: &dyn RecordStore,
    mut input: R,
    mut out: W,
) -> Result<SaveOutcome, MindtypeError>
where
    C: Clock,
    R: BufRead,
    W: Write,
{
    say(
        &mut out,
        &format!(
            "\nParticipant {}\n",
            wizard.session().participant_id().as_str()
        ),
    )?;

    consent(wizard, &mut input, &mut out)?;
    questionnaire(wizard, &mut input, &mut out)?;
    while let Some(kind) = wizard.stage().task_kind() {
        typing_task(wizard, kind, &mut input, &mut out)?;
    }

    let outcome = wizard.finish(store)?;
    say(&mut out, &format!("\n{}\n", outcome.message()))?;
    Ok(outcome)
}

// =============================================================================
// STAGES
// =============================================================================

fn consent<C: Clock, R: BufRead, W: Write>(
    wizard: &mut Wizard<C>,
    input: &mut R,
    out: &mut W,
) -> Result<(), MindtypeError> {
    let min_age = wizard.config().min_age;
    say(out, "\n== Consent & Demographics ==\n")?;

    loop {
        let age = ask(out, input, &format!("Age ({}-{}): ", min_age, MAX_AGE))?
            .parse::<u8>()
            .ok();

        let genders: Vec<&str> = Gender::ALL.iter().map(|g| g.label()).collect();
        let gender = pick(&ask(out, input, &menu("Gender", &genders))?, &Gender::ALL);

        let years: Vec<&str> = YearOfStudy::ALL.iter().map(|y| y.label()).collect();
        let year_of_study = pick(
            &ask(out, input, &menu("Year of study", &years))?,
            &YearOfStudy::ALL,
        );

        let answer = ask(out, input, "I consent to take part in this study (y/n): ")?;
        let consent = matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes");

        match wizard.submit_consent(DemographicsInput {
            age,
            gender,
            year_of_study,
            consent,
        }) {
            Ok(()) => return Ok(()),
            Err(MindtypeError::Validation(msg)) => say(out, &format!("\n{}\n\n", msg))?,
            Err(e) => return Err(e),
        }
    }
}

fn questionnaire<C: Clock, R: BufRead, W: Write>(
    wizard: &mut Wizard<C>,
    input: &mut R,
    out: &mut W,
) -> Result<(), MindtypeError> {
    say(out, &format!("\n== PHQ-9 ==\n{}\n", PHQ9_STEM))?;
    let options: Vec<String> = PHQ9_OPTIONS
        .iter()
        .enumerate()
        .map(|(i, label)| format!("  {} = {}", i, label))
        .collect();

    let mut answers = Vec::with_capacity(PHQ9_QUESTIONS.len());
    for (i, question) in PHQ9_QUESTIONS.iter().enumerate() {
        say(out, &format!("\n{}. {}\n{}\n", i + 1, question, options.join("\n")))?;
        loop {
            match ask(out, input, "Answer (0-3): ")?.parse::<u8>() {
                Ok(v) if usize::from(v) < PHQ9_OPTIONS.len() => {
                    answers.push(v);
                    break;
                }
                _ => say(out, "Please enter 0, 1, 2 or 3.\n")?,
            }
        }
    }

    // Shown before submitting: the wizard holds during the advisory.
    if QuestionnaireResult::from_answers(&answers)?.is_high_distress() {
        say(out, &format!("\n{}\n", Advisory::HighDistress.message()))?;
    }

    let outcome = wizard.submit_questionnaire(&answers)?;
    say(
        out,
        &format!(
            "\nPHQ-9 total: {} ({})\n",
            outcome.result.total_score,
            outcome.result.severity.label()
        ),
    )?;
    Ok(())
}

fn typing_task<C: Clock, R: BufRead, W: Write>(
    wizard: &mut Wizard<C>,
    kind: TaskKind,
    input: &mut R,
    out: &mut W,
) -> Result<(), MindtypeError> {
    match kind {
        TaskKind::Copy => say(
            out,
            &format!("\n== Copy Task ==\nType the following text:\n\n{}\n", COPY_TEXT),
        )?,
        TaskKind::FreeWriting => say(
            out,
            &format!("\n== Free Writing ==\n{}\n", FREE_WRITING_PROMPT),
        )?,
    }
    say(
        out,
        &format!(
            "(at least {} characters; finish with a line containing only '{}')\n\n",
            MIN_TRANSCRIPT_CHARS, END_OF_TASK
        ),
    )?;

    wizard.start_task()?;
    let mut transcript = String::new();

    loop {
        let line = read_line(input)?;
        if line.trim() != END_OF_TASK {
            let kept = transcript.len();
            if !transcript.is_empty() {
                transcript.push('\n');
            }
            transcript.push_str(&line);
            match wizard.update_transcript(&transcript) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    transcript.truncate(kept);
                    say(out, &format!("Line not added: {}\n", e))?;
                }
                Err(e) => return Err(e),
            }
            continue;
        }

        let readout = wizard.live_readout()?;
        match wizard.complete_task() {
            Ok(task) => {
                say(
                    out,
                    &format!(
                        "Done: {} words in {} seconds.\n",
                        task.word_count(),
                        format_seconds(task.duration_ms)
                    ),
                )?;
                return Ok(());
            }
            Err(MindtypeError::TaskIncomplete { chars, required, .. }) => {
                let elapsed = readout
                    .elapsed
                    .map(|e| format!(", {} elapsed", e))
                    .unwrap_or_default();
                say(
                    out,
                    &format!(
                        "Please keep typing: {} of {} characters ({} words{}).\n",
                        chars, required, readout.word_count, elapsed
                    ),
                )?;
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// PROMPT HELPERS
// =============================================================================

fn say<W: Write>(out: &mut W, text: &str) -> Result<(), MindtypeError> {
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| MindtypeError::Io(format!("write to terminal: {}", e)))
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String, MindtypeError> {
    let mut line = String::new();
    let n = input
        .read_line(&mut line)
        .map_err(|e| MindtypeError::Io(format!("read from terminal: {}", e)))?;
    if n == 0 {
        return Err(MindtypeError::Io(
            "input closed before the study finished".to_string(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn ask<R: BufRead, W: Write>(
    out: &mut W,
    input: &mut R,
    prompt: &str,
) -> Result<String, MindtypeError> {
    say(out, prompt)?;
    Ok(read_line(input)?.trim().to_string())
}

fn menu(title: &str, labels: &[&str]) -> String {
    let items: Vec<String> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| format!("{}) {}", i + 1, label))
        .collect();
    format!("{} [{}]: ", title, items.join(", "))
}

/// Resolve a menu answer given either as a 1-based number or a label.
fn pick<T: Copy + std::str::FromStr>(answer: &str, options: &[T]) -> Option<T> {
    match answer.parse::<usize>() {
        Ok(n) => n.checked_sub(1).and_then(|i| options.get(i)).copied(),
        Err(_) => answer.parse().ok(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
