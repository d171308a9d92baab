use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::question::QuestionType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttemptStatus {
    InProgress,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestAttempt {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub attempt_number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerRecord>>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TestAttempt {
    pub fn status(&self) -> AttemptStatus {
        if self.ended_at.is_some() {
            AttemptStatus::Finished
        } else {
            AttemptStatus::InProgress
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status() == AttemptStatus::Finished
    }

    /// Elapsed time, zero while the attempt is still open.
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at.unwrap_or(self.started_at) - self.started_at
    }

    /// Key for ordering by end time; open attempts rank by their start.
    pub fn sort_ended_at(&self) -> DateTime<Utc> {
        self.ended_at.unwrap_or(self.started_at)
    }

    /// Key for ordering by score; open attempts rank as zero.
    pub fn sort_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnswerRecord {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub user_answer: serde_json::Value,
    pub is_correct: bool,
}

/// What a test-taker sends for one question when finishing.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnswerSubmission {
    pub question_id: i64,
    pub question_type: QuestionType,
    pub user_answer: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewTestAttempt {
    pub user_id: i64,
    pub test_id: i64,
    pub attempt_number: i64,
    pub started_at: DateTime<Utc>,
}

/// Everything written when an attempt is finished.
#[derive(Clone, Debug, PartialEq)]
pub struct AttemptOutcome {
    pub answers: Vec<AnswerRecord>,
    pub score: f64,
    pub ended_at: DateTime<Utc>,
}

/// Next number in a user's sequence of attempts at one test.
pub fn next_attempt_number(existing: &[TestAttempt]) -> i64 {
    existing
        .iter()
        .map(|a| a.attempt_number)
        .max()
        .map_or(1, |max| max + 1)
}
