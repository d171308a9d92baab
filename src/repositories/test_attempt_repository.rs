use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{from_bson_datetime, to_bson_datetime, Database},
    errors::{is_duplicate_key, AppError, AppResult},
    models::{
        domain::{AnswerRecord, AttemptOutcome, NewTestAttempt, TestAttempt},
        dto::query::{AttemptFilter, AttemptQuery, AttemptSortField, PageResult},
    },
};

#[async_trait]
pub trait TestAttemptRepository: Send + Sync {
    /// Inserts an attempt. A second attempt with the same
    /// (user_id, test_id, attempt_number) fails with `AlreadyExists`.
    async fn create(&self, attempt: NewTestAttempt) -> AppResult<TestAttempt>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<TestAttempt>>;
    async fn find_by_user_and_test(&self, user_id: i64, test_id: i64)
        -> AppResult<Vec<TestAttempt>>;
    /// Writes the outcome only if the attempt is still open. Returns whether
    /// this call was the one that finished it.
    async fn finish(&self, id: i64, outcome: &AttemptOutcome) -> AppResult<bool>;
    async fn list(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>>;
    async fn delete_by_test(&self, test_id: i64) -> AppResult<u64>;
}

const ATTEMPT_SEQUENCE: &str = "test_attempts";

#[derive(Debug, Serialize, Deserialize)]
struct AttemptRecord {
    id: i64,
    user_id: i64,
    test_id: i64,
    attempt_number: i64,
    score: Option<f64>,
    /// Answer records kept as JSON text.
    answers_json: Option<String>,
    started_at: bson::DateTime,
    ended_at: Option<bson::DateTime>,
    duration_ms: i64,
    /// `ended_at`, or `started_at` while open.
    sort_ended_at: bson::DateTime,
    /// `score`, or zero while open.
    sort_score: f64,
}

impl TryFrom<AttemptRecord> for TestAttempt {
    type Error = AppError;

    fn try_from(record: AttemptRecord) -> AppResult<Self> {
        let answers = record
            .answers_json
            .as_deref()
            .map(serde_json::from_str::<Vec<AnswerRecord>>)
            .transpose()?;

        Ok(TestAttempt {
            id: record.id,
            user_id: record.user_id,
            test_id: record.test_id,
            attempt_number: record.attempt_number,
            score: record.score,
            answers,
            started_at: from_bson_datetime(record.started_at),
            ended_at: record.ended_at.map(from_bson_datetime),
        })
    }
}

pub struct MongoTestAttemptRepository {
    db: Database,
    collection: Collection<AttemptRecord>,
}

impl MongoTestAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("test_attempts");
        Self {
            db: db.clone(),
            collection,
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for test_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let numbering_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "test_id": 1, "attempt_number": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_test_attempt_unique".to_string())
                    .build(),
            )
            .build();

        let test_id_index = IndexModel::builder()
            .keys(doc! { "test_id": 1 })
            .options(IndexOptions::builder().name("test_id".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(numbering_index).await?;
        self.collection.create_index(test_id_index).await?;

        log::info!("Successfully created indexes for test_attempts collection");
        Ok(())
    }
}

fn filter_document(filter: &AttemptFilter) -> Document {
    let mut document = doc! {};

    if !filter.test_ids.is_empty() {
        document.insert("test_id", doc! { "$in": filter.test_ids.clone() });
    }

    if !filter.user_ids.is_empty() {
        document.insert("user_id", doc! { "$in": filter.user_ids.clone() });
    }

    document
}

fn sort_document(query: &AttemptQuery) -> Document {
    let field = match query.sort.field {
        AttemptSortField::StartedAt => "started_at",
        AttemptSortField::EndedAt => "sort_ended_at",
        AttemptSortField::Score => "sort_score",
        AttemptSortField::AttemptNumber => "attempt_number",
        AttemptSortField::Duration => "duration_ms",
    };
    let direction = query.sort.direction.as_mongo();
    let mut sort = Document::new();
    sort.insert(field, direction);
    sort.insert("id", direction);
    sort
}

#[async_trait]
impl TestAttemptRepository for MongoTestAttemptRepository {
    async fn create(&self, attempt: NewTestAttempt) -> AppResult<TestAttempt> {
        let id = self.db.next_id(ATTEMPT_SEQUENCE).await?;

        let started_at = to_bson_datetime(attempt.started_at);
        let record = AttemptRecord {
            id,
            user_id: attempt.user_id,
            test_id: attempt.test_id,
            attempt_number: attempt.attempt_number,
            score: None,
            answers_json: None,
            started_at,
            ended_at: None,
            duration_ms: 0,
            sort_ended_at: started_at,
            sort_score: 0.0,
        };

        match self.collection.insert_one(&record).await {
            Ok(_) => TestAttempt::try_from(record),
            Err(err) if is_duplicate_key(&err) => Err(AppError::AlreadyExists(format!(
                "Attempt {} of test {} by user {} already exists",
                attempt.attempt_number, attempt.test_id, attempt.user_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<TestAttempt>> {
        self.collection
            .find_one(doc! { "id": id })
            .await?
            .map(TestAttempt::try_from)
            .transpose()
    }

    async fn find_by_user_and_test(
        &self,
        user_id: i64,
        test_id: i64,
    ) -> AppResult<Vec<TestAttempt>> {
        let records: Vec<AttemptRecord> = self
            .collection
            .find(doc! { "user_id": user_id, "test_id": test_id })
            .sort(doc! { "attempt_number": 1 })
            .await?
            .try_collect()
            .await?;

        records.into_iter().map(TestAttempt::try_from).collect()
    }

    async fn finish(&self, id: i64, outcome: &AttemptOutcome) -> AppResult<bool> {
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(false);
        };

        let ended_at = to_bson_datetime(outcome.ended_at);
        let duration_ms = (outcome.ended_at - current.started_at).num_milliseconds();
        let answers_json = serde_json::to_string(&outcome.answers)?;

        let result = self
            .collection
            .update_one(
                doc! { "id": id, "ended_at": bson::Bson::Null },
                doc! {
                    "$set": {
                        "score": outcome.score,
                        "answers_json": answers_json,
                        "ended_at": ended_at,
                        "duration_ms": duration_ms,
                        "sort_ended_at": ended_at,
                        "sort_score": outcome.score,
                    }
                },
            )
            .await?;

        Ok(result.matched_count == 1)
    }

    async fn list(&self, query: &AttemptQuery) -> AppResult<PageResult<TestAttempt>> {
        let filter = filter_document(&query.filter);

        let total = self.collection.count_documents(filter.clone()).await?;
        if total == 0 {
            return Ok(PageResult::empty());
        }

        let (skip, limit) = query.page.window(None);
        let mut find = self
            .collection
            .find(filter)
            .sort(sort_document(query))
            .skip(skip);
        if let Some(limit) = limit {
            find = find.limit(limit as i64);
        }

        let records: Vec<AttemptRecord> = find.await?.try_collect().await?;
        let items = records
            .into_iter()
            .map(TestAttempt::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PageResult {
            items,
            total_count: total,
        })
    }

    async fn delete_by_test(&self, test_id: i64) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "test_id": test_id })
            .await?;
        Ok(result.deleted_count)
    }
}
