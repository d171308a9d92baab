use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::domain::test_attempt::{AnswerRecord, AttemptStatus, TestAttempt};

#[derive(Debug, Clone, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAttemptResponse {
    pub attempt_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestAttemptDto {
    pub id: i64,
    pub user_id: i64,
    pub test_id: i64,
    pub attempt_number: i64,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerRecord>>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
}

impl From<TestAttempt> for TestAttemptDto {
    fn from(attempt: TestAttempt) -> Self {
        TestAttemptDto {
            status: attempt.status(),
            duration_seconds: attempt.duration().num_seconds(),
            id: attempt.id,
            user_id: attempt.user_id,
            test_id: attempt.test_id,
            attempt_number: attempt.attempt_number,
            score: attempt.score,
            answers: attempt.answers,
            started_at: attempt.started_at,
            ended_at: attempt.ended_at,
        }
    }
}
