#[cfg(test)]
pub mod fixtures {
    use chrono::Utc;

    use crate::auth::Claims;
    use crate::models::domain::{NewQuestion, Question, QuestionType, Role, Test};

    /// Creates a question belonging to test 1.
    pub fn question(id: i64, question_type: QuestionType, task_json: &str) -> Question {
        NewQuestion {
            index: id as i32,
            question_type,
            text: None,
            task_json: task_json.to_string(),
            image_url: None,
        }
        .into_question(id, 1)
    }

    /// One question of each type, ids 1 to 4.
    pub fn mixed_test() -> Test {
        Test {
            id: 1,
            author_id: 9,
            title: "Mixed".to_string(),
            description: None,
            questions: vec![
                question(
                    1,
                    QuestionType::SingleChoice,
                    r#"{"options":["A","B","C"],"answer":[false,true,false]}"#,
                ),
                question(
                    2,
                    QuestionType::MultipleChoice,
                    r#"{"options":["A","B","C"],"answer":[true,false,true]}"#,
                ),
                question(
                    3,
                    QuestionType::Matching,
                    r#"{"answer":[["cat","meow"],["dog","woof"]]}"#,
                ),
                question(4, QuestionType::FillInTheBlank, r#"{"answer":"Paris"}"#),
            ],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn claims(user_id: i64, role: Role) -> Claims {
        Claims {
            sub: user_id,
            login: format!("user{}", user_id),
            role,
            iat: 0,
            exp: 9999999999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;

    #[test]
    fn test_fixtures_mixed_test() {
        let test = mixed_test();
        assert_eq!(test.questions.len(), 4);
        assert!(test.questions.iter().all(|q| q.task().is_ok()));
    }
}
