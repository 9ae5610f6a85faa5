//! User identities and the credential resolver.
//!
//! A [`User`] is created exactly once, the first time an unknown username
//! resolves successfully while auto-registration is enabled. It is never
//! updated or deleted here. Stores own the records; the resolver only reads
//! and inserts through the [`UserStore`] trait.

mod memory;
pub mod password;
mod postgres;
pub mod resolver;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use resolver::{CredentialResolver, ResolveError, Resolved, ResolvedOutcome, ResolverConfig};

use crate::storage::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Public identity handed to sessions and handlers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// A user row including its bcrypt hash. Never leaves the identity layer.
#[derive(Clone)]
pub struct StoredUser {
    pub user: User,
    pub password_hash: String,
}

impl std::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUser")
            .field("user", &self.user)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Persistent user records keyed by a unique, case-sensitive username.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<StoredUser>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Insert a new user. Must return [`StoreError::Conflict`] when the
    /// username is already taken, including by a concurrent insert.
    async fn insert(&self, username: &str, password_hash: &str)
        -> Result<StoredUser, StoreError>;

    /// Cheap liveness probe used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
