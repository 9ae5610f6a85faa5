//! Credential resolution: verify a known user or register an unknown one.
//!
//! Flow Overview:
//! 1. Look up the username (exact, case-sensitive match).
//! 2. Unknown username: register it when auto-registration is enabled,
//!    otherwise reject after a dummy verification so both branches cost the
//!    same bcrypt work.
//! 3. Known username: verify the password against the stored hash.
//!
//! No transaction wraps the lookup and the insert. Two first-time logins for
//! the same username can both miss in step 1; the store's uniqueness
//! constraint makes exactly one insert win and the loser is retried as a
//! login against the winner's row.

use super::{password, StoredUser, User, UserStore};
use crate::storage::StoreError;
use anyhow::anyhow;
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

// Hashed once, lazily, to burn the same bcrypt work for unknown usernames.
const TIMING_PLACEHOLDER: &str = "passgate-timing-placeholder";

/// Why a resolution did not produce an identity.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Wrong password for a known user, or an unknown user while
    /// auto-registration is disabled.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// A concurrent first-time login claimed the username with a different
    /// password.
    #[error("username was registered concurrently")]
    DuplicateRegistration,
    #[error("storage failure: {0:#}")]
    StorageFailure(#[source] anyhow::Error),
    #[error("password hashing failure: {0:#}")]
    Hashing(#[source] anyhow::Error),
}

impl ResolveError {
    /// Rejections are answers about the credentials; everything else is a
    /// failure of the service and must not be shown as "wrong password".
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::DuplicateRegistration)
    }
}

impl From<StoreError> for ResolveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::DuplicateRegistration,
            StoreError::Backend(err) => Self::StorageFailure(err),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedOutcome {
    Registered,
    Authenticated,
}

#[derive(Clone, Debug)]
pub struct Resolved {
    pub user: User,
    pub outcome: ResolvedOutcome,
}

#[derive(Clone, Copy, Debug)]
pub struct ResolverConfig {
    auto_register_unknown_users: bool,
    bcrypt_cost: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_register_unknown_users: false,
            bcrypt_cost: password::DEFAULT_COST,
        }
    }
}

impl ResolverConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat any unknown username as a signup. Off by default: a mistyped
    /// username silently becomes a new account.
    #[must_use]
    pub const fn with_auto_register_unknown_users(mut self, enabled: bool) -> Self {
        self.auto_register_unknown_users = enabled;
        self
    }

    #[must_use]
    pub const fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub const fn auto_register_unknown_users(&self) -> bool {
        self.auto_register_unknown_users
    }

    #[must_use]
    pub const fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }
}

pub struct CredentialResolver {
    users: Arc<dyn UserStore>,
    config: ResolverConfig,
    timing_hash: OnceCell<String>,
}

impl CredentialResolver {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, config: ResolverConfig) -> Self {
        Self {
            users,
            config,
            timing_hash: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a username/password pair to a user identity.
    ///
    /// # Errors
    /// Returns a rejection ([`ResolveError::InvalidCredentials`],
    /// [`ResolveError::DuplicateRegistration`]) or a failure
    /// ([`ResolveError::StorageFailure`], [`ResolveError::Hashing`]).
    #[instrument(skip(self, password))]
    pub async fn resolve(
        &self,
        username: &str,
        password: SecretString,
    ) -> Result<Resolved, ResolveError> {
        match self.users.find_by_username(username).await? {
            Some(stored) => self.login(stored, password).await,
            None if self.config.auto_register_unknown_users => {
                self.register(username, password).await
            }
            None => {
                self.burn_verification(password).await?;
                debug!("unknown username and auto-registration disabled");
                Err(ResolveError::InvalidCredentials)
            }
        }
    }

    async fn login(
        &self,
        stored: StoredUser,
        password: SecretString,
    ) -> Result<Resolved, ResolveError> {
        if password::verify(password, stored.password_hash)
            .await
            .map_err(ResolveError::Hashing)?
        {
            Ok(Resolved {
                user: stored.user,
                outcome: ResolvedOutcome::Authenticated,
            })
        } else {
            Err(ResolveError::InvalidCredentials)
        }
    }

    async fn register(
        &self,
        username: &str,
        password: SecretString,
    ) -> Result<Resolved, ResolveError> {
        let password_hash = password::hash(password.clone(), self.config.bcrypt_cost)
            .await
            .map_err(ResolveError::Hashing)?;

        match self.users.insert(username, &password_hash).await {
            Ok(stored) => {
                info!(user_id = %stored.user.id, "registered new user");
                Ok(Resolved {
                    user: stored.user,
                    outcome: ResolvedOutcome::Registered,
                })
            }
            Err(StoreError::Conflict) => {
                debug!("username claimed concurrently, retrying as login");
                let winner = self.users.find_by_username(username).await?.ok_or_else(|| {
                    ResolveError::StorageFailure(anyhow!(
                        "user missing after unique violation on username"
                    ))
                })?;
                self.login(winner, password).await.map_err(|err| match err {
                    ResolveError::InvalidCredentials => ResolveError::DuplicateRegistration,
                    other => other,
                })
            }
            Err(StoreError::Backend(err)) => Err(ResolveError::StorageFailure(err)),
        }
    }

    async fn burn_verification(&self, password: SecretString) -> Result<(), ResolveError> {
        let cost = self.config.bcrypt_cost;
        let timing_hash = self
            .timing_hash
            .get_or_try_init(|| {
                password::hash(SecretString::from(TIMING_PLACEHOLDER.to_string()), cost)
            })
            .await
            .map_err(ResolveError::Hashing)?;
        password::verify(password, timing_hash.clone())
            .await
            .map_err(ResolveError::Hashing)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryUserStore;
    use anyhow::{Context, Result};
    use async_trait::async_trait;
    use tokio::sync::Barrier;
    use uuid::Uuid;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn auto_register() -> ResolverConfig {
        ResolverConfig::new()
            .with_auto_register_unknown_users(true)
            .with_bcrypt_cost(password::MIN_COST)
    }

    fn resolver(store: Arc<MemoryUserStore>, config: ResolverConfig) -> CredentialResolver {
        CredentialResolver::new(store, config)
    }

    #[test]
    fn defaults_disable_auto_registration() {
        let config = ResolverConfig::default();
        assert!(!config.auto_register_unknown_users());
        assert_eq!(config.bcrypt_cost(), password::DEFAULT_COST);
    }

    #[test]
    fn rejections_are_separated_from_failures() {
        assert!(ResolveError::InvalidCredentials.is_rejection());
        assert!(ResolveError::DuplicateRegistration.is_rejection());
        assert!(!ResolveError::StorageFailure(anyhow!("down")).is_rejection());
        assert!(!ResolveError::Hashing(anyhow!("panic")).is_rejection());
    }

    #[tokio::test]
    async fn first_login_registers_exactly_once() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = resolver(store.clone(), auto_register());

        let first = resolver.resolve("alice", secret("secret")).await?;
        assert_eq!(first.outcome, ResolvedOutcome::Registered);
        assert_eq!(first.user.username, "alice");

        let second = resolver.resolve("alice", secret("secret")).await?;
        assert_eq!(second.outcome, ResolvedOutcome::Authenticated);
        assert_eq!(second.user, first.user);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn known_user_with_wrong_password_is_rejected_without_overwrite() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = resolver(store.clone(), auto_register());
        resolver.resolve("alice", secret("secret")).await?;
        let before = store
            .find_by_username("alice")
            .await?
            .context("missing user")?;

        let result = resolver.resolve("alice", secret("wrong")).await;
        assert!(matches!(result, Err(ResolveError::InvalidCredentials)));

        let after = store
            .find_by_username("alice")
            .await?
            .context("missing user")?;
        assert_eq!(before.password_hash, after.password_hash);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn stored_hash_is_never_the_plaintext() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = resolver(store.clone(), auto_register());
        resolver.resolve("alice", secret("secret")).await?;
        resolver.resolve("bob", secret("secret")).await?;

        let alice = store.find_by_username("alice").await?.context("alice")?;
        let bob = store.find_by_username("bob").await?.context("bob")?;
        assert_ne!(alice.password_hash, "secret");
        assert_ne!(alice.password_hash, bob.password_hash);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_rejected_when_auto_register_disabled() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let config = ResolverConfig::new().with_bcrypt_cost(password::MIN_COST);
        let resolver = resolver(store.clone(), config);

        let result = resolver.resolve("mallory", secret("secret")).await;
        assert!(matches!(result, Err(ResolveError::InvalidCredentials)));
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn existing_user_logs_in_when_auto_register_disabled() -> Result<()> {
        let store = Arc::new(MemoryUserStore::new());
        let hashed = password::hash(secret("secret"), password::MIN_COST).await?;
        let stored = store.insert("alice", &hashed).await?;
        let resolver = resolver(
            store,
            ResolverConfig::new().with_bcrypt_cost(password::MIN_COST),
        );

        let resolved = resolver.resolve("alice", secret("secret")).await?;
        assert_eq!(resolved.outcome, ResolvedOutcome::Authenticated);
        assert_eq!(resolved.user.id, stored.user.id);
        Ok(())
    }

    /// Fails every call, as if the database connection dropped.
    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn find_by_username(&self, _: &str) -> Result<Option<StoredUser>, StoreError> {
            Err(StoreError::Backend(anyhow!("connection reset")))
        }

        async fn find_by_id(&self, _: Uuid) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend(anyhow!("connection reset")))
        }

        async fn insert(&self, _: &str, _: &str) -> Result<StoredUser, StoreError> {
            Err(StoreError::Backend(anyhow!("connection reset")))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend(anyhow!("connection reset")))
        }
    }

    #[tokio::test]
    async fn storage_errors_are_not_invalid_credentials() {
        let resolver = CredentialResolver::new(Arc::new(BrokenStore), auto_register());
        let result = resolver.resolve("alice", secret("secret")).await;
        assert!(matches!(result, Err(ResolveError::StorageFailure(_))));
    }

    /// Holds every username lookup until `parties` callers have missed, so
    /// concurrent first-time logins all take the registration branch.
    struct RacingStore {
        inner: MemoryUserStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<StoredUser>, StoreError> {
            let found = self.inner.find_by_username(username).await?;
            if found.is_none() {
                self.barrier.wait().await;
            }
            Ok(found)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, username: &str, hash: &str) -> Result<StoredUser, StoreError> {
            self.inner.insert(username, hash).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_first_logins_create_one_user() -> Result<()> {
        let store = Arc::new(RacingStore {
            inner: MemoryUserStore::new(),
            barrier: Barrier::new(2),
        });
        let resolver = Arc::new(CredentialResolver::new(store.clone(), auto_register()));

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("alice", secret("secret")).await }
        });
        let second = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("alice", secret("secret")).await }
        });

        let first = first.await??;
        let second = second.await??;

        assert_eq!(first.user.id, second.user.id);
        let mut outcomes = [first.outcome, second.outcome];
        outcomes.sort_by_key(|outcome| *outcome == ResolvedOutcome::Authenticated);
        assert_eq!(
            outcomes,
            [ResolvedOutcome::Registered, ResolvedOutcome::Authenticated]
        );
        assert_eq!(store.inner.len().await, 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_first_logins_with_different_passwords() -> Result<()> {
        let store = Arc::new(RacingStore {
            inner: MemoryUserStore::new(),
            barrier: Barrier::new(2),
        });
        let resolver = Arc::new(CredentialResolver::new(store.clone(), auto_register()));

        let first = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("alice", secret("one")).await }
        });
        let second = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("alice", secret("two")).await }
        });

        let results = [first.await?, second.await?];
        let registered = results.iter().filter(|result| result.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|result| matches!(result, Err(ResolveError::DuplicateRegistration)))
            .count();
        assert_eq!(registered, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(store.inner.len().await, 1);
        Ok(())
    }
}
