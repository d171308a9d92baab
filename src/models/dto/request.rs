use serde::Deserialize;
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::domain::{AnswerSubmission, NewQuestion, QuestionType, TaskPayload};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuestionRequest {
    pub question_type: QuestionType,

    #[validate(length(max = 4000))]
    pub text: Option<String>,

    #[validate(length(min = 2, max = 100000))]
    pub task_json: String,

    #[validate(url)]
    pub image_url: Option<String>,
}

/// Body of test create and update requests.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TestRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    #[validate(nested)]
    pub questions: Vec<QuestionRequest>,
}

impl TestRequest {
    /// Validates the request and every task payload against its declared
    /// type. Question order in the request becomes the stored index.
    pub fn into_questions(self) -> AppResult<(String, Option<String>, Vec<NewQuestion>)> {
        self.validate()?;

        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(position, q)| {
                TaskPayload::parse(q.question_type, &q.task_json).map_err(|e| {
                    AppError::ValidationError(format!(
                        "question {} has an invalid task payload: {}",
                        position + 1,
                        e
                    ))
                })?;

                Ok(NewQuestion {
                    index: position as i32,
                    question_type: q.question_type,
                    text: q.text,
                    task_json: q.task_json,
                    image_url: q.image_url,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((self.title, self.description, questions))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FinishAttemptRequest {
    #[validate(length(max = 1000))]
    pub answers: Vec<AnswerSubmission>,
}
