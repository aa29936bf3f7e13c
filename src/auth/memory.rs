use std::collections::HashMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::repo::{StoreError, UserStore};
use crate::auth::repo_types::User;

/// In-process [`UserStore`]; the uniqueness check and the insert happen
/// under one lock, mirroring the table's UNIQUE constraint.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn insert(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_insert_of_same_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.insert("a@x.com", "h1").await.expect("first insert");
        let err = store.insert("a@x.com", "h2").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn lookups_find_inserted_user() {
        let store = MemoryUserStore::new();
        let user = store.insert("b@x.com", "h").await.expect("insert");
        let by_email = store.find_by_email("b@x.com").await.expect("ok").expect("some");
        assert_eq!(by_email.id, user.id);
        let by_id = store.find_by_id(user.id).await.expect("ok").expect("some");
        assert_eq!(by_id.email, "b@x.com");
        assert!(store.find_by_email("nobody@x.com").await.expect("ok").is_none());
    }
}
