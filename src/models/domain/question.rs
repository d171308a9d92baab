use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::{AppError, AppResult};
use crate::models::domain::task::TaskPayload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum QuestionType {
    SingleChoice = 0,
    MultipleChoice = 1,
    Matching = 2,
    FillInTheBlank = 3,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub index: i32,
    pub question_type: QuestionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// JSON text whose shape depends on `question_type`.
    pub task_json: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Question {
    /// Parses the canonical payload, reporting which question is broken.
    pub fn task(&self) -> AppResult<TaskPayload> {
        TaskPayload::parse(self.question_type, &self.task_json).map_err(|e| {
            AppError::MalformedQuestionPayload {
                question_id: self.id,
                reason: e.to_string(),
            }
        })
    }
}

/// A question before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuestion {
    pub index: i32,
    pub question_type: QuestionType,
    pub text: Option<String>,
    pub task_json: String,
    pub image_url: Option<String>,
}

impl NewQuestion {
    pub fn into_question(self, id: i64, test_id: i64) -> Question {
        Question {
            id,
            test_id,
            index: self.index,
            question_type: self.question_type,
            text: self.text,
            task_json: self.task_json,
            image_url: self.image_url,
        }
    }
}
