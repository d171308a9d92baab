use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    errors::{AppError, AppResult, Resource},
    models::{
        domain::{
            test_attempt::next_attempt_number, AnswerRecord, AnswerSubmission, AttemptOutcome,
            NewTestAttempt, SubmittedAnswer, Test, TestAttempt,
        },
        dto::query::{AttemptQuery, PageResult},
    },
    repositories::{TestAttemptRepository, TestRepository, UserRepository},
};

/// Starts, presents, grades and reports test attempts.
pub struct AttemptService {
    tests: Arc<dyn TestRepository>,
    users: Arc<dyn UserRepository>,
    attempts: Arc<dyn TestAttemptRepository>,
    rng: Mutex<StdRng>,
    start_retries: u32,
}

impl AttemptService {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        users: Arc<dyn UserRepository>,
        attempts: Arc<dyn TestAttemptRepository>,
        start_retries: u32,
    ) -> Self {
        Self {
            tests,
            users,
            attempts,
            rng: Mutex::new(StdRng::from_entropy()),
            start_retries: start_retries.max(1),
        }
    }

    /// Replaces the shuffle source, e.g. with a seeded generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// Opens a new attempt and returns its id. Attempt numbers run 1, 2, ...
    /// per (user, test); a numbering collision with a concurrent start is
    /// retried a bounded number of times.
    pub async fn start_attempt(&self, test_id: i64, user_id: i64) -> AppResult<i64> {
        let (test, user) = futures::join!(
            self.tests.find_by_id(test_id),
            self.users.find_by_id(user_id)
        );

        if test?.is_none() {
            return Err(AppError::not_found(Resource::Test, test_id));
        }
        if user?.is_none() {
            return Err(AppError::not_found(Resource::User, user_id));
        }

        for round in 1..=self.start_retries {
            let existing = self.attempts.find_by_user_and_test(user_id, test_id).await?;
            let attempt_number = next_attempt_number(&existing);

            let new_attempt = NewTestAttempt {
                user_id,
                test_id,
                attempt_number,
                started_at: Utc::now(),
            };

            match self.attempts.create(new_attempt).await {
                Ok(attempt) => {
                    log::info!(
                        "User {} started attempt {} (#{}) on test {}",
                        user_id,
                        attempt.id,
                        attempt.attempt_number,
                        test_id
                    );
                    return Ok(attempt.id);
                }
                Err(AppError::AlreadyExists(_)) => {
                    log::warn!(
                        "Attempt number {} for user {} on test {} was taken (round {}/{})",
                        attempt_number,
                        user_id,
                        test_id,
                        round,
                        self.start_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Could not allocate an attempt number for user {} on test {}",
            user_id, test_id
        )))
    }

    /// Returns the test with every correct answer stripped. Matching
    /// questions get their right column shuffled on each call.
    pub async fn prepare_for_presentation(&self, test_id: i64) -> AppResult<Test> {
        let mut test = self
            .tests
            .find_by_id(test_id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Test, test_id))?;

        let payloads = test
            .questions
            .iter()
            .map(|q| q.task())
            .collect::<AppResult<Vec<_>>>()?;

        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            for (question, payload) in test.questions.iter_mut().zip(payloads) {
                question.task_json = payload.redacted(&mut *rng).to_json()?;
            }
        }

        log::debug!(
            "Prepared test {} with {} questions for presentation",
            test.id,
            test.questions.len()
        );
        Ok(test)
    }

    /// Grades the submissions and closes the attempt. An attempt can be
    /// finished exactly once.
    pub async fn finish_attempt(
        &self,
        attempt_id: i64,
        submissions: Vec<AnswerSubmission>,
    ) -> AppResult<()> {
        let attempt = self
            .attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Attempt, attempt_id))?;

        if attempt.is_finished() {
            return Err(AppError::AlreadyFinished(attempt_id));
        }

        let test = self
            .tests
            .find_by_id(attempt.test_id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Test, attempt.test_id))?;

        if test.questions.is_empty() {
            return Err(AppError::InvalidTest(format!(
                "test {} has no questions",
                test.id
            )));
        }

        let (answers, score) = grade_submissions(&test, submissions)?;
        let outcome = AttemptOutcome {
            answers,
            score,
            ended_at: Utc::now(),
        };

        if !self.attempts.finish(attempt_id, &outcome).await? {
            return Err(AppError::AlreadyFinished(attempt_id));
        }

        log::info!(
            "Attempt {} on test {} finished with score {:.2}",
            attempt_id,
            test.id,
            score
        );
        Ok(())
    }

    pub async fn get_attempt_by_id(&self, attempt_id: i64) -> AppResult<TestAttempt> {
        self.attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Attempt, attempt_id))
    }

    pub async fn list_attempts(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>> {
        let page = self.attempts.list(query).await?;
        if page.total_count == 0 {
            return Ok(PageResult::empty());
        }
        Ok(page)
    }
}

/// Grades submissions against the test's canonical answers and returns the
/// answer records with the score as a percentage of all questions.
///
/// Submissions for unknown questions are skipped, and only the first
/// submission per question counts.
pub fn grade_submissions(
    test: &Test,
    submissions: Vec<AnswerSubmission>,
) -> AppResult<(Vec<AnswerRecord>, f64)> {
    let mut graded = HashSet::new();
    let mut records = Vec::with_capacity(submissions.len());
    let mut correct = 0usize;

    for submission in submissions {
        let Some(question) = test.question(submission.question_id) else {
            log::debug!(
                "Skipping answer for question {} which is not part of test {}",
                submission.question_id,
                test.id
            );
            continue;
        };

        if !graded.insert(question.id) {
            log::warn!(
                "Ignoring repeated answer for question {} on test {}",
                question.id,
                test.id
            );
            continue;
        }

        let canonical = question.task()?;

        let is_correct = if canonical.question_type() != submission.question_type {
            log::warn!(
                "Answer for question {} declares type {:?}, expected {:?}",
                question.id,
                submission.question_type,
                question.question_type
            );
            false
        } else {
            match SubmittedAnswer::parse(question.question_type, &submission.user_answer) {
                Ok(answer) => canonical.is_satisfied_by(&answer),
                Err(e) => {
                    log::warn!("Unreadable answer for question {}: {}", question.id, e);
                    false
                }
            }
        };

        if is_correct {
            correct += 1;
        }

        records.push(AnswerRecord {
            question_id: question.id,
            question_type: question.question_type,
            user_answer: submission.user_answer,
            is_correct,
        });
    }

    let score = correct as f64 / test.questions.len() as f64 * 100.0;
    Ok((records, score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::QuestionType;
    use crate::test_utils::fixtures::mixed_test;
    use serde_json::json;

    fn submit(
        question_id: i64,
        question_type: QuestionType,
        answer: serde_json::Value,
    ) -> AnswerSubmission {
        AnswerSubmission {
            question_id,
            question_type,
            user_answer: json!({ "answer": answer }),
        }
    }

    #[test]
    fn three_of_four_correct_scores_75() {
        let submissions = vec![
            submit(1, QuestionType::SingleChoice, json!([false, true, false])),
            submit(2, QuestionType::MultipleChoice, json!([true, true, true])),
            submit(3, QuestionType::Matching, json!([["cat", "meow"], ["dog", "woof"]])),
            submit(4, QuestionType::FillInTheBlank, json!("paris")),
        ];

        let (records, score) = grade_submissions(&mixed_test(), submissions).expect("grading");
        assert_eq!(score, 75.0);
        let flags: Vec<bool> = records.iter().map(|r| r.is_correct).collect();
        assert_eq!(flags, vec![true, false, true, true]);
    }

    #[test]
    fn fill_in_the_blank_is_case_insensitive_but_not_trimmed() {
        let test = mixed_test();

        let (records, _) =
            grade_submissions(&test, vec![submit(4, QuestionType::FillInTheBlank, json!("PARIS"))])
                .expect("grading");
        assert!(records[0].is_correct);

        let (records, _) =
            grade_submissions(&test, vec![submit(4, QuestionType::FillInTheBlank, json!(" Paris"))])
                .expect("grading");
        assert!(!records[0].is_correct);
    }

    #[test]
    fn matching_compares_pairs_in_order() {
        let submissions = vec![submit(
            3,
            QuestionType::Matching,
            json!([["dog", "woof"], ["cat", "meow"]]),
        )];
        let (records, score) = grade_submissions(&mixed_test(), submissions).expect("grading");
        assert!(!records[0].is_correct);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn unknown_and_repeated_questions_are_not_graded() {
        let submissions = vec![
            submit(99, QuestionType::FillInTheBlank, json!("x")),
            submit(4, QuestionType::FillInTheBlank, json!("paris")),
            submit(4, QuestionType::FillInTheBlank, json!("paris")),
        ];

        let (records, score) = grade_submissions(&mixed_test(), submissions).expect("grading");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question_id, 4);
        assert_eq!(score, 25.0);
    }

    #[test]
    fn mismatched_or_unreadable_answers_count_as_wrong() {
        let submissions = vec![
            submit(1, QuestionType::FillInTheBlank, json!("B")),
            AnswerSubmission {
                question_id: 4,
                question_type: QuestionType::FillInTheBlank,
                user_answer: json!({ "text": "Paris" }),
            },
        ];

        let (records, score) = grade_submissions(&mixed_test(), submissions).expect("grading");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.is_correct));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn malformed_canonical_payload_is_reported() {
        let mut test = mixed_test();
        test.questions[3].task_json = "not json".to_string();

        let result = grade_submissions(
            &test,
            vec![submit(4, QuestionType::FillInTheBlank, json!("paris"))],
        );
        assert!(matches!(
            result,
            Err(AppError::MalformedQuestionPayload { question_id: 4, .. })
        ));
    }
}
