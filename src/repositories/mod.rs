pub mod test_attempt_repository;
pub mod test_repository;
pub mod user_repository;

pub use test_attempt_repository::{MongoTestAttemptRepository, TestAttemptRepository};
pub use test_repository::{MongoTestRepository, TestRepository};
pub use user_repository::{MongoUserRepository, UserRepository};
