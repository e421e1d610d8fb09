use crate::auth::User;
use crate::error::FirebaseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted auth session row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbSession {
    pub storage_key: String,
    pub user_json: String,
    pub updated_at: DateTime<Utc>,
}

impl DbSession {
    pub fn new(storage_key: impl Into<String>, user: &User) -> Result<Self, FirebaseError> {
        Ok(Self {
            storage_key: storage_key.into(),
            user_json: serde_json::to_string(user)?,
            updated_at: Utc::now(),
        })
    }

    pub fn into_user(self) -> Result<User, FirebaseError> {
        Ok(serde_json::from_str(&self.user_json)?)
    }
}
