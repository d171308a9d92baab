use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult, Resource},
    models::{
        domain::{Actor, NewTest, Test, TestUpdate},
        dto::{
            query::{PageParams, PageResult, TestQuery},
            request::TestRequest,
        },
    },
    repositories::{TestAttemptRepository, TestRepository},
};

/// Authoring side of the test catalogue.
pub struct TestService {
    tests: Arc<dyn TestRepository>,
    attempts: Arc<dyn TestAttemptRepository>,
    page_size: u64,
}

impl TestService {
    pub fn new(
        tests: Arc<dyn TestRepository>,
        attempts: Arc<dyn TestAttemptRepository>,
        page_size: u64,
    ) -> Self {
        Self {
            tests,
            attempts,
            page_size: page_size.max(1),
        }
    }

    pub async fn create_test(&self, author_id: i64, request: TestRequest) -> AppResult<i64> {
        let (title, description, questions) = request.into_questions()?;

        let test = self
            .tests
            .create(NewTest {
                author_id,
                title,
                description,
                questions,
                created_at: Utc::now(),
            })
            .await?;

        log::info!(
            "User {} created test {} with {} questions",
            author_id,
            test.id,
            test.questions.len()
        );
        Ok(test.id)
    }

    pub async fn get_test(&self, test_id: i64) -> AppResult<Test> {
        self.tests
            .find_by_id(test_id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Test, test_id))
    }

    /// Lists tests, paging by the configured size when the caller gives none.
    pub async fn list_tests(&self, query: TestQuery) -> AppResult<PageResult<Test>> {
        let query = TestQuery {
            page: PageParams {
                page: query.page.page,
                page_size: query.page.page_size.or(Some(self.page_size)),
            },
            ..query
        };
        self.tests.list(&query).await
    }

    pub async fn update_test(
        &self,
        test_id: i64,
        actor: &Actor,
        request: TestRequest,
    ) -> AppResult<Test> {
        self.authorize_owner(test_id, actor).await?;
        let (title, description, questions) = request.into_questions()?;

        let test = self
            .tests
            .replace(
                test_id,
                TestUpdate {
                    title,
                    description,
                    questions,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        log::info!("User {} updated test {}", actor.user_id, test_id);
        Ok(test)
    }

    /// Removes the test together with every attempt made on it.
    pub async fn delete_test(&self, test_id: i64, actor: &Actor) -> AppResult<()> {
        self.authorize_owner(test_id, actor).await?;

        let removed = self.attempts.delete_by_test(test_id).await?;
        self.tests.delete(test_id).await?;

        log::info!(
            "User {} deleted test {} and {} attempts",
            actor.user_id,
            test_id,
            removed
        );
        Ok(())
    }

    async fn authorize_owner(&self, test_id: i64, actor: &Actor) -> AppResult<()> {
        let test = self.get_test(test_id).await?;
        if !actor.owns_or_admin(test.author_id) {
            return Err(AppError::Forbidden(format!(
                "Only the author or an administrator can modify test {}",
                test_id
            )));
        }
        Ok(())
    }
}
