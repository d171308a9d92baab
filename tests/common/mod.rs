#![allow(dead_code)]

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering as AtomicOrdering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use assessment_server::{
    config::Config,
    errors::{AppError, AppResult, Resource},
    models::{
        domain::{
            AttemptOutcome, NewQuestion, NewTest, NewTestAttempt, NewUser, QuestionType, Role,
            Test, TestAttempt, TestUpdate, User,
        },
        dto::query::{
            AttemptQuery, AttemptSortField, PageParams, PageResult, SortDirection, TestQuery,
            TestSortField,
        },
    },
    repositories::{TestAttemptRepository, TestRepository, UserRepository},
    services::{AttemptService, TestService},
};
use secrecy::SecretString;

fn page_of<T>(items: Vec<T>, page: &PageParams) -> PageResult<T> {
    let total = items.len() as u64;
    if total == 0 {
        return PageResult::empty();
    }

    let (skip, limit) = page.window(None);
    let items = items
        .into_iter()
        .skip(skip as usize)
        .take(limit.map_or(usize::MAX, |l| l as usize))
        .collect();

    PageResult {
        items,
        total_count: total,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

pub struct InMemoryTestRepository {
    tests: RwLock<HashMap<i64, Test>>,
    next_test_id: AtomicI64,
    next_question_id: AtomicI64,
}

impl InMemoryTestRepository {
    pub fn new() -> Self {
        Self {
            tests: RwLock::new(HashMap::new()),
            next_test_id: AtomicI64::new(1),
            next_question_id: AtomicI64::new(1),
        }
    }

    fn next_question_id(&self) -> i64 {
        self.next_question_id.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl TestRepository for InMemoryTestRepository {
    async fn create(&self, test: NewTest) -> AppResult<Test> {
        let id = self.next_test_id.fetch_add(1, AtomicOrdering::SeqCst);
        let questions = test
            .questions
            .into_iter()
            .map(|q| q.into_question(self.next_question_id(), id))
            .collect();

        let test = Test {
            id,
            author_id: test.author_id,
            title: test.title,
            description: test.description,
            questions,
            created_at: test.created_at,
            updated_at: None,
        };
        self.tests.write().await.insert(id, test.clone());
        Ok(test)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Test>> {
        Ok(self.tests.read().await.get(&id).cloned())
    }

    async fn list(&self, query: &TestQuery) -> AppResult<PageResult<Test>> {
        let keywords = query.filter.keywords();
        let tests = self.tests.read().await;

        let mut items: Vec<Test> = tests
            .values()
            .filter(|t| query.filter.test_ids.is_empty() || query.filter.test_ids.contains(&t.id))
            .filter(|t| {
                query.filter.author_ids.is_empty() || query.filter.author_ids.contains(&t.author_id)
            })
            .filter(|t| {
                let title = t.title.to_lowercase();
                let description = t.description.as_deref().unwrap_or("").to_lowercase();
                keywords
                    .iter()
                    .all(|k| title.contains(k.as_str()) || description.contains(k.as_str()))
            })
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let ordering = match query.sort.field {
                TestSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                TestSortField::UpdatedAt => a
                    .updated_at
                    .unwrap_or(a.created_at)
                    .cmp(&b.updated_at.unwrap_or(b.created_at)),
                TestSortField::Title => a.title.cmp(&b.title),
                TestSortField::QuestionCount => a.questions.len().cmp(&b.questions.len()),
            };
            directed(ordering.then(a.id.cmp(&b.id)), query.sort.direction)
        });

        Ok(page_of(items, &query.page))
    }

    async fn replace(&self, id: i64, update: TestUpdate) -> AppResult<Test> {
        let mut tests = self.tests.write().await;
        let test = tests
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(Resource::Test, id))?;

        test.title = update.title;
        test.description = update.description;
        test.questions = update
            .questions
            .into_iter()
            .map(|q| q.into_question(self.next_question_id(), id))
            .collect();
        test.updated_at = Some(update.updated_at);
        Ok(test.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.tests
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found(Resource::Test, id))
    }
}

pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.login == user.login) {
            return Err(AppError::AlreadyExists(format!(
                "User with login '{}' already exists",
                user.login
            )));
        }

        let user = user.into_user(self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
        users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

/// Enforces unique attempt numbers per (user, test) and finish-once like the
/// Mongo store does.
pub struct InMemoryAttemptRepository {
    attempts: RwLock<HashMap<i64, TestAttempt>>,
    next_id: AtomicI64,
}

impl InMemoryAttemptRepository {
    pub fn new() -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn count(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[async_trait]
impl TestAttemptRepository for InMemoryAttemptRepository {
    async fn create(&self, attempt: NewTestAttempt) -> AppResult<TestAttempt> {
        // Widen the gap between reading the next number and inserting it.
        tokio::task::yield_now().await;

        let mut attempts = self.attempts.write().await;
        let taken = attempts.values().any(|a| {
            a.user_id == attempt.user_id
                && a.test_id == attempt.test_id
                && a.attempt_number == attempt.attempt_number
        });
        if taken {
            return Err(AppError::AlreadyExists(format!(
                "Attempt {} already exists",
                attempt.attempt_number
            )));
        }

        let created = TestAttempt {
            id: self.next_id.fetch_add(1, AtomicOrdering::SeqCst),
            user_id: attempt.user_id,
            test_id: attempt.test_id,
            attempt_number: attempt.attempt_number,
            score: None,
            answers: None,
            started_at: attempt.started_at,
            ended_at: None,
        };
        attempts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TestAttempt>> {
        Ok(self.attempts.read().await.get(&id).cloned())
    }

    async fn find_by_user_and_test(
        &self,
        user_id: i64,
        test_id: i64,
    ) -> AppResult<Vec<TestAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .filter(|a| a.user_id == user_id && a.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn finish(&self, id: i64, outcome: &AttemptOutcome) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(&id) {
            Some(attempt) if attempt.ended_at.is_none() => {
                attempt.score = Some(outcome.score);
                attempt.answers = Some(outcome.answers.clone());
                attempt.ended_at = Some(outcome.ended_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>> {
        let attempts = self.attempts.read().await;
        let filter = &query.filter;

        let mut items: Vec<TestAttempt> = attempts
            .values()
            .filter(|a| filter.test_ids.is_empty() || filter.test_ids.contains(&a.test_id))
            .filter(|a| filter.user_ids.is_empty() || filter.user_ids.contains(&a.user_id))
            .cloned()
            .collect();

        items.sort_by(|a, b| {
            let ordering = match query.sort.field {
                AttemptSortField::StartedAt => a.started_at.cmp(&b.started_at),
                AttemptSortField::EndedAt => a.sort_ended_at().cmp(&b.sort_ended_at()),
                AttemptSortField::Score => a.sort_score().total_cmp(&b.sort_score()),
                AttemptSortField::AttemptNumber => a.attempt_number.cmp(&b.attempt_number),
                AttemptSortField::Duration => a.duration().cmp(&b.duration()),
            };
            directed(ordering.then(a.id.cmp(&b.id)), query.sort.direction)
        });

        Ok(page_of(items, &query.page))
    }

    async fn delete_by_test(&self, test_id: i64) -> AppResult<u64> {
        let mut attempts = self.attempts.write().await;
        let before = attempts.len();
        attempts.retain(|_, a| a.test_id != test_id);
        Ok((before - attempts.len()) as u64)
    }
}

/// Claims every attempt number is already taken.
pub struct SaturatedAttemptRepository {
    pub inner: InMemoryAttemptRepository,
    pub create_calls: AtomicUsize,
}

impl SaturatedAttemptRepository {
    pub fn new() -> Self {
        Self {
            inner: InMemoryAttemptRepository::new(),
            create_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TestAttemptRepository for SaturatedAttemptRepository {
    async fn create(&self, attempt: NewTestAttempt) -> AppResult<TestAttempt> {
        self.create_calls.fetch_add(1, AtomicOrdering::SeqCst);
        Err(AppError::AlreadyExists(format!(
            "Attempt {} already exists",
            attempt.attempt_number
        )))
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TestAttempt>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_user_and_test(
        &self,
        user_id: i64,
        test_id: i64,
    ) -> AppResult<Vec<TestAttempt>> {
        self.inner.find_by_user_and_test(user_id, test_id).await
    }

    async fn finish(&self, id: i64, outcome: &AttemptOutcome) -> AppResult<bool> {
        self.inner.finish(id, outcome).await
    }

    async fn list(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>> {
        self.inner.list(query).await
    }

    async fn delete_by_test(&self, test_id: i64) -> AppResult<u64> {
        self.inner.delete_by_test(test_id).await
    }
}

/// Storage that fails when asked to drop a test's attempts.
pub struct FailingCleanupAttemptRepository {
    pub inner: InMemoryAttemptRepository,
}

#[async_trait]
impl TestAttemptRepository for FailingCleanupAttemptRepository {
    async fn create(&self, attempt: NewTestAttempt) -> AppResult<TestAttempt> {
        self.inner.create(attempt).await
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TestAttempt>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_user_and_test(
        &self,
        user_id: i64,
        test_id: i64,
    ) -> AppResult<Vec<TestAttempt>> {
        self.inner.find_by_user_and_test(user_id, test_id).await
    }

    async fn finish(&self, id: i64, outcome: &AttemptOutcome) -> AppResult<bool> {
        self.inner.finish(id, outcome).await
    }

    async fn list(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>> {
        self.inner.list(query).await
    }

    async fn delete_by_test(&self, _test_id: i64) -> AppResult<u64> {
        Err(AppError::DatabaseError("attempt store unavailable".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        mongo_conn_string: "mongodb://localhost:27017".to_string(),
        mongo_db_name: "assessment-test".to_string(),
        web_server_host: "127.0.0.1".to_string(),
        web_server_port: 8080,
        jwt_secret: SecretString::from("integration_test_secret_value".to_string()),
        jwt_expiration_hours: 1,
        attempt_start_retries: 3,
        test_page_size: 10,
    }
}

/// In-memory repositories plus services wired over them.
pub struct Harness {
    pub tests: Arc<InMemoryTestRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub attempts: Arc<InMemoryAttemptRepository>,
    pub attempt_service: Arc<AttemptService>,
    pub test_service: Arc<TestService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_retries(3)
    }

    pub fn with_retries(retries: u32) -> Self {
        let tests = Arc::new(InMemoryTestRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let attempts = Arc::new(InMemoryAttemptRepository::new());

        let attempt_service = Arc::new(AttemptService::new(
            tests.clone(),
            users.clone(),
            attempts.clone(),
            retries,
        ));
        let test_service = Arc::new(TestService::new(tests.clone(), attempts.clone(), 10));

        Self {
            tests,
            users,
            attempts,
            attempt_service,
            test_service,
        }
    }

    pub async fn user(&self, login: &str, role: Role) -> User {
        self.users
            .create(NewUser::new(login, "Test", "User", role))
            .await
            .unwrap()
    }

    pub async fn test_with(&self, author_id: i64, questions: Vec<NewQuestion>) -> Test {
        self.tests
            .create(NewTest {
                author_id,
                title: "Sample".to_string(),
                description: None,
                questions,
                created_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    /// One question of each type.
    pub async fn mixed_test(&self, author_id: i64) -> Test {
        self.test_with(author_id, mixed_questions()).await
    }
}

pub fn new_question(index: i32, question_type: QuestionType, task_json: &str) -> NewQuestion {
    NewQuestion {
        index,
        question_type,
        text: Some(format!("Question {}", index + 1)),
        task_json: task_json.to_string(),
        image_url: None,
    }
}

pub fn mixed_questions() -> Vec<NewQuestion> {
    vec![
        new_question(
            0,
            QuestionType::SingleChoice,
            r#"{"options":["A","B","C"],"answer":[false,true,false]}"#,
        ),
        new_question(
            1,
            QuestionType::MultipleChoice,
            r#"{"options":["A","B","C"],"answer":[true,false,true]}"#,
        ),
        new_question(
            2,
            QuestionType::Matching,
            r#"{"answer":[["cat","meow"],["dog","woof"],["cow","moo"],["duck","quack"]]}"#,
        ),
        new_question(3, QuestionType::FillInTheBlank, r#"{"answer":"Paris"}"#),
    ]
}
