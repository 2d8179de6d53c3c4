use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, UniqueField, UserStore},
    repo_types::{NewUser, User},
};

/// In-process store for `memory://` and tests. The write lock plays the
/// role of the database's unique indexes and row locks.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live_token(user: &User, token_hash: &str, now: OffsetDateTime) -> bool {
    match (&user.reset_token_hash, user.reset_token_expires_at) {
        (Some(hash), Some(expires_at)) => hash == token_hash && expires_at > now,
        _ => false,
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, new: NewUser<'_>) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username.to_string(),
            email: new.email.to_string(),
            password_hash: new.password_hash.to_string(),
            reset_token_hash: None,
            reset_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        if let Some(user) = self.users.write().await.get_mut(&user_id) {
            user.reset_token_hash = Some(token_hash.to_string());
            user.reset_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| live_token(u, token_hash, now))
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        new_password_hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| live_token(u, token_hash, now)) else {
            return Ok(None);
        };
        user.password_hash = new_password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        Ok(Some(user.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn alice() -> NewUser<'static> {
        NewUser {
            username: "alice",
            email: "a@x.com",
            password_hash: "hash",
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email_before_username() {
        let store = MemoryUserStore::new();
        store.insert(alice()).await.unwrap();

        let err = store.insert(alice()).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        let err = store
            .insert(NewUser {
                email: "other@x.com",
                ..alice()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Username)));
    }

    #[tokio::test]
    async fn concurrent_inserts_yield_one_winner() {
        let store = std::sync::Arc::new(MemoryUserStore::new());
        let a = {
            let s = store.clone();
            tokio::spawn(async move { s.insert(alice()).await })
        };
        let b = {
            let s = store.clone();
            tokio::spawn(async move { s.insert(alice()).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn reset_token_is_single_use_and_expires() {
        let store = MemoryUserStore::new();
        let user = store.insert(alice()).await.unwrap();
        let now = OffsetDateTime::now_utc();

        store
            .set_reset_token(user.id, "tok", now + Duration::minutes(5))
            .await
            .unwrap();
        assert!(store
            .find_by_reset_token("tok", now + Duration::minutes(10))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.consume_reset_token("tok", now, "new").await.unwrap(),
            Some(user.id)
        );
        assert!(store
            .consume_reset_token("tok", now, "newer")
            .await
            .unwrap()
            .is_none());

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert!(stored.reset_token_hash.is_none());
        assert!(stored.reset_token_expires_at.is_none());
    }
}
