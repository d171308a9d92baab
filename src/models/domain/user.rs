use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Role {
    Admin,
    #[default]
    Student,
    Teacher,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(login: &str, first_name: &str, last_name: &str, role: Role) -> Self {
        NewUser {
            login: login.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            role,
        }
    }

    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            login: self.login,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            created_at: Utc::now(),
        }
    }
}

/// The acting user of a request, as supplied by the identity layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns_or_admin(&self, owner_id: i64) -> bool {
        self.is_admin() || self.user_id == owner_id
    }
}
