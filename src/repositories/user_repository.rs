use async_trait::async_trait;
use mongodb::{
    bson::{self, doc, Document},
    options::IndexOptions,
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{from_bson_datetime, Database},
    errors::AppResult,
    models::domain::{Role, User},
};

/// Read access to accounts; users are provisioned outside this service.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    id: i64,
    login: String,
    first_name: String,
    last_name: String,
    #[serde(default)]
    role: Role,
    created_at: bson::DateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            login: record.login,
            first_name: record.first_name,
            last_name: record.last_name,
            role: record.role,
            created_at: from_bson_datetime(record.created_at),
        }
    }
}

pub struct MongoUserRepository {
    collection: Collection<UserRecord>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.get_collection("users"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        for field in ["id", "login"] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(format!("{}_unique", field))
                        .build(),
                )
                .build();
            self.collection.create_index(model).await?;
        }

        log::info!("Created unique indexes on users.id and users.login");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let record = self.collection.find_one(doc! { "id": id }).await?;
        Ok(record.map(User::from))
    }
}
