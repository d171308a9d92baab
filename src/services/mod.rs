pub mod attempt_service;
pub mod test_service;

pub use attempt_service::AttemptService;
pub use test_service::TestService;
