//! Typed forms of the JSON payloads carried by questions and answers.
//!
//! Canonical payloads are parsed against the question's declared type and
//! rejected when they do not fit it, so grading and redaction only ever see
//! well-formed data.

use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::models::domain::question::QuestionType;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{options} options but {answers} answer flags")]
    LengthMismatch { options: usize, answers: usize },

    #[error("left value '{0}' appears more than once")]
    DuplicateLeft(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChoiceTask {
    pub options: Vec<String>,
    pub answer: Vec<bool>,
}

/// Pairs are `(left, right)` and serialize as two-element arrays.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct MatchingTask {
    pub answer: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FillInTheBlankTask {
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskPayload {
    SingleChoice(ChoiceTask),
    MultipleChoice(ChoiceTask),
    Matching(MatchingTask),
    FillInTheBlank(FillInTheBlankTask),
}

impl TaskPayload {
    pub fn parse(question_type: QuestionType, json: &str) -> Result<Self, TaskError> {
        let payload = match question_type {
            QuestionType::SingleChoice => TaskPayload::SingleChoice(serde_json::from_str(json)?),
            QuestionType::MultipleChoice => {
                TaskPayload::MultipleChoice(serde_json::from_str(json)?)
            }
            QuestionType::Matching => TaskPayload::Matching(serde_json::from_str(json)?),
            QuestionType::FillInTheBlank => {
                TaskPayload::FillInTheBlank(serde_json::from_str(json)?)
            }
        };
        payload.check()?;
        Ok(payload)
    }

    fn check(&self) -> Result<(), TaskError> {
        match self {
            TaskPayload::SingleChoice(task) | TaskPayload::MultipleChoice(task) => {
                if task.options.len() != task.answer.len() {
                    return Err(TaskError::LengthMismatch {
                        options: task.options.len(),
                        answers: task.answer.len(),
                    });
                }
            }
            TaskPayload::Matching(task) => {
                let mut seen = HashSet::new();
                for (left, _) in &task.answer {
                    if !seen.insert(left.as_str()) {
                        return Err(TaskError::DuplicateLeft(left.clone()));
                    }
                }
            }
            TaskPayload::FillInTheBlank(_) => {}
        }
        Ok(())
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            TaskPayload::SingleChoice(_) => QuestionType::SingleChoice,
            TaskPayload::MultipleChoice(_) => QuestionType::MultipleChoice,
            TaskPayload::Matching(_) => QuestionType::Matching,
            TaskPayload::FillInTheBlank(_) => QuestionType::FillInTheBlank,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            TaskPayload::SingleChoice(task) | TaskPayload::MultipleChoice(task) => {
                serde_json::to_string(task)
            }
            TaskPayload::Matching(task) => serde_json::to_string(task),
            TaskPayload::FillInTheBlank(task) => serde_json::to_string(task),
        }
    }

    /// Strips correct-answer information. Matching keeps the left column and
    /// pairs it with a random permutation of the right column.
    pub fn redacted<R: Rng + ?Sized>(&self, rng: &mut R) -> TaskPayload {
        match self {
            TaskPayload::SingleChoice(task) => TaskPayload::SingleChoice(hide_choices(task)),
            TaskPayload::MultipleChoice(task) => TaskPayload::MultipleChoice(hide_choices(task)),
            TaskPayload::Matching(task) => {
                let mut rights: Vec<String> =
                    task.answer.iter().map(|(_, right)| right.clone()).collect();
                rights.shuffle(rng);

                let answer = task
                    .answer
                    .iter()
                    .map(|(left, _)| left.clone())
                    .zip(rights)
                    .collect();
                TaskPayload::Matching(MatchingTask { answer })
            }
            TaskPayload::FillInTheBlank(_) => TaskPayload::FillInTheBlank(FillInTheBlankTask {
                answer: String::new(),
            }),
        }
    }

    /// Compares a submitted answer with this canonical one. Lists compare in
    /// order; free text compares case-insensitively without trimming.
    pub fn is_satisfied_by(&self, submitted: &SubmittedAnswer) -> bool {
        match (self, submitted) {
            (
                TaskPayload::SingleChoice(task) | TaskPayload::MultipleChoice(task),
                SubmittedAnswer::Choice(flags),
            ) => task.answer == *flags,
            (TaskPayload::Matching(task), SubmittedAnswer::Matching(pairs)) => {
                task.answer == *pairs
            }
            (TaskPayload::FillInTheBlank(task), SubmittedAnswer::Text(text)) => {
                task.answer.to_lowercase() == text.to_lowercase()
            }
            _ => false,
        }
    }
}

fn hide_choices(task: &ChoiceTask) -> ChoiceTask {
    ChoiceTask {
        options: task.options.clone(),
        answer: vec![false; task.answer.len()],
    }
}

/// The `answer` member of a test-taker's payload, read per question type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmittedAnswer {
    Choice(Vec<bool>),
    Matching(Vec<(String, String)>),
    Text(String),
}

#[derive(Deserialize)]
struct AnswerEnvelope<T> {
    answer: T,
}

fn answer_of<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T, TaskError> {
    let envelope: AnswerEnvelope<T> = serde_json::from_value(payload.clone())?;
    Ok(envelope.answer)
}

impl SubmittedAnswer {
    pub fn parse(
        question_type: QuestionType,
        payload: &serde_json::Value,
    ) -> Result<Self, TaskError> {
        let answer = match question_type {
            QuestionType::SingleChoice | QuestionType::MultipleChoice => {
                SubmittedAnswer::Choice(answer_of(payload)?)
            }
            QuestionType::Matching => SubmittedAnswer::Matching(answer_of(payload)?),
            QuestionType::FillInTheBlank => SubmittedAnswer::Text(answer_of(payload)?),
        };
        Ok(answer)
    }
}
