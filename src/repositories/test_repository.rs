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
    errors::{AppError, AppResult, Resource},
    models::{
        domain::{NewQuestion, NewTest, Question, Test, TestUpdate},
        dto::query::{PageResult, TestFilter, TestQuery, TestSortField},
    },
};

#[async_trait]
pub trait TestRepository: Send + Sync {
    /// Stores a new test, assigning ids to it and its questions.
    async fn create(&self, test: NewTest) -> AppResult<Test>;
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Test>>;
    async fn list(&self, query: &TestQuery) -> AppResult<PageResult<Test>>;
    /// Replaces title, description and the whole question list.
    async fn replace(&self, id: i64, update: TestUpdate) -> AppResult<Test>;
    async fn delete(&self, id: i64) -> AppResult<()>;
}

const TEST_SEQUENCE: &str = "tests";
const QUESTION_SEQUENCE: &str = "questions";

#[derive(Debug, Serialize, Deserialize)]
struct TestRecord {
    id: i64,
    author_id: i64,
    title: String,
    description: Option<String>,
    questions: Vec<Question>,
    question_count: i64,
    created_at: bson::DateTime,
    updated_at: Option<bson::DateTime>,
    /// `updated_at`, or `created_at` for tests never edited.
    modified_at: bson::DateTime,
}

impl From<TestRecord> for Test {
    fn from(record: TestRecord) -> Self {
        Test {
            id: record.id,
            author_id: record.author_id,
            title: record.title,
            description: record.description,
            questions: record.questions,
            created_at: from_bson_datetime(record.created_at),
            updated_at: record.updated_at.map(from_bson_datetime),
        }
    }
}

impl From<&Test> for TestRecord {
    fn from(test: &Test) -> Self {
        let created_at = to_bson_datetime(test.created_at);
        let updated_at = test.updated_at.map(to_bson_datetime);
        TestRecord {
            id: test.id,
            author_id: test.author_id,
            title: test.title.clone(),
            description: test.description.clone(),
            questions: test.questions.clone(),
            question_count: test.questions.len() as i64,
            created_at,
            updated_at,
            modified_at: updated_at.unwrap_or(created_at),
        }
    }
}

pub struct MongoTestRepository {
    db: Database,
    collection: Collection<TestRecord>,
}

impl MongoTestRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("tests");
        Self {
            db: db.clone(),
            collection,
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for tests collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let author_index = IndexModel::builder()
            .keys(doc! { "author_id": 1 })
            .options(IndexOptions::builder().name("author_id".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(author_index).await?;

        log::info!("Successfully created indexes for tests collection");
        Ok(())
    }

    async fn assign_question_ids(
        &self,
        test_id: i64,
        questions: Vec<NewQuestion>,
    ) -> AppResult<Vec<Question>> {
        let mut assigned = Vec::with_capacity(questions.len());
        for question in questions {
            let id = self.db.next_id(QUESTION_SEQUENCE).await?;
            assigned.push(question.into_question(id, test_id));
        }
        Ok(assigned)
    }
}

fn filter_document(filter: &TestFilter) -> Document {
    let mut conditions = Vec::new();

    for keyword in filter.keywords() {
        let pattern = regex::escape(&keyword);
        conditions.push(doc! {
            "$or": [
                { "title": { "$regex": pattern.as_str(), "$options": "i" } },
                { "description": { "$regex": pattern.as_str(), "$options": "i" } },
            ]
        });
    }

    if !filter.test_ids.is_empty() {
        conditions.push(doc! { "id": { "$in": filter.test_ids.clone() } });
    }

    if !filter.author_ids.is_empty() {
        conditions.push(doc! { "author_id": { "$in": filter.author_ids.clone() } });
    }

    if conditions.is_empty() {
        doc! {}
    } else {
        doc! { "$and": conditions }
    }
}

fn sort_document(query: &TestQuery) -> Document {
    let field = match query.sort.field {
        TestSortField::CreatedAt => "created_at",
        TestSortField::UpdatedAt => "modified_at",
        TestSortField::Title => "title",
        TestSortField::QuestionCount => "question_count",
    };
    let direction = query.sort.direction.as_mongo();
    let mut sort = Document::new();
    sort.insert(field, direction);
    sort.insert("id", direction);
    sort
}

#[async_trait]
impl TestRepository for MongoTestRepository {
    async fn create(&self, test: NewTest) -> AppResult<Test> {
        let id = self.db.next_id(TEST_SEQUENCE).await?;
        let questions = self.assign_question_ids(id, test.questions).await?;

        let test = Test {
            id,
            author_id: test.author_id,
            title: test.title,
            description: test.description,
            questions,
            created_at: test.created_at,
            updated_at: None,
        };

        self.collection.insert_one(TestRecord::from(&test)).await?;
        Ok(test)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Test>> {
        let record = self.collection.find_one(doc! { "id": id }).await?;
        Ok(record.map(Test::from))
    }

    async fn list(&self, query: &TestQuery) -> AppResult<PageResult<Test>> {
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

        let records: Vec<TestRecord> = find.await?.try_collect().await?;

        Ok(PageResult {
            items: records.into_iter().map(Test::from).collect(),
            total_count: total,
        })
    }

    async fn replace(&self, id: i64, update: TestUpdate) -> AppResult<Test> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(Resource::Test, id))?;

        let questions = self.assign_question_ids(id, update.questions).await?;
        let test = Test {
            title: update.title,
            description: update.description,
            questions,
            updated_at: Some(update.updated_at),
            ..existing
        };

        let result = self
            .collection
            .replace_one(doc! { "id": id }, TestRecord::from(&test))
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::not_found(Resource::Test, id));
        }

        Ok(test)
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = self.collection.delete_one(doc! { "id": id }).await?;

        if result.deleted_count == 0 {
            return Err(AppError::not_found(Resource::Test, id));
        }

        Ok(())
    }
}
