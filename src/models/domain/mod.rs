pub mod question;
pub mod task;
pub mod test_attempt;
pub mod user;
pub use question::{NewQuestion, Question, QuestionType};
pub use task::{SubmittedAnswer, TaskPayload};
pub use test::{NewTest, Test, TestUpdate};
pub use test_attempt::{AnswerRecord, AnswerSubmission, AttemptOutcome, NewTestAttempt, TestAttempt};
pub use user::{Actor, NewUser, Role, User};
