//! In-process user store for tests and `--in-memory` local runs.

use super::{StoredUser, User, UserStore};
use crate::storage::StoreError;
use async_trait::async_trait;
use std::collections::{hash_map::Entry, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Users {
    by_username: HashMap<String, StoredUser>,
    by_id: HashMap<Uuid, String>,
}

/// [`UserStore`] backed by a map. The username key gives the same
/// uniqueness guarantee as the Postgres constraint.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Users>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.by_username.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
        Ok(self.users.read().await.by_username.get(username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .by_id
            .get(&id)
            .and_then(|username| users.by_username.get(username))
            .map(|stored| stored.user.clone()))
    }

    async fn insert(&self, username: &str, password_hash: &str) -> Result<StoredUser, StoreError> {
        let mut users = self.users.write().await;
        let stored = match users.by_username.entry(username.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => slot
                .insert(StoredUser {
                    user: User {
                        id: Uuid::new_v4(),
                        username: username.to_string(),
                    },
                    password_hash: password_hash.to_string(),
                })
                .clone(),
        };
        users.by_id.insert(stored.user.id, stored.user.username.clone());
        Ok(stored)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[tokio::test]
    async fn insert_then_find() -> Result<()> {
        let store = MemoryUserStore::new();
        let stored = store.insert("alice", "hash").await?;

        let by_name = store
            .find_by_username("alice")
            .await?
            .context("missing user")?;
        assert_eq!(by_name.user, stored.user);
        assert_eq!(by_name.password_hash, "hash");

        let by_id = store
            .find_by_id(stored.user.id)
            .await?
            .context("missing user")?;
        assert_eq!(by_id.username, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() -> Result<()> {
        let store = MemoryUserStore::new();
        store.insert("alice", "first").await?;
        let second = store.insert("alice", "second").await;
        assert!(matches!(second, Err(StoreError::Conflict)));
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() -> Result<()> {
        let store = MemoryUserStore::new();
        store.insert("alice", "hash").await?;
        assert!(store.find_by_username("Alice").await?.is_none());
        store.insert("Alice", "hash").await?;
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_id_is_none() -> Result<()> {
        let store = MemoryUserStore::new();
        assert!(store.find_by_id(Uuid::new_v4()).await?.is_none());
        Ok(())
    }
}
