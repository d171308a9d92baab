use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        MongoTestAttemptRepository, MongoTestRepository, MongoUserRepository,
        TestAttemptRepository, TestRepository, UserRepository,
    },
    services::{AttemptService, TestService},
};

#[derive(Clone)]
pub struct AppState {
    pub test_service: Arc<TestService>,
    pub attempt_service: Arc<AttemptService>,
    /// Absent when the services run on non-Mongo repositories.
    pub db: Option<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let test_repository = Arc::new(MongoTestRepository::new(&db));
        test_repository.ensure_indexes().await?;

        let attempt_repository = Arc::new(MongoTestAttemptRepository::new(&db));
        attempt_repository.ensure_indexes().await?;

        let user_repository = Arc::new(MongoUserRepository::new(&db));
        user_repository.ensure_indexes().await?;

        let mut state = Self::from_repositories(
            config,
            test_repository,
            user_repository,
            attempt_repository,
        );
        state.db = Some(db);
        Ok(state)
    }

    /// Wires the services over any repository implementations.
    pub fn from_repositories(
        config: Config,
        tests: Arc<dyn TestRepository>,
        users: Arc<dyn UserRepository>,
        attempts: Arc<dyn TestAttemptRepository>,
    ) -> Self {
        let test_service = Arc::new(TestService::new(
            tests.clone(),
            attempts.clone(),
            config.test_page_size,
        ));
        let attempt_service = Arc::new(AttemptService::new(
            tests,
            users,
            attempts,
            config.attempt_start_retries,
        ));

        Self {
            test_service,
            attempt_service,
            db: None,
            config: Arc::new(config),
        }
    }
}
