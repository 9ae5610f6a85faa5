//! Authenticated sessions.
//!
//! A session binds a random token (held only by the client, in a cookie) to a
//! user id. Stores only ever see a keyed hash of the token, so a leaked
//! `user_sessions` table cannot be replayed without the session secret.
//!
//! ## Expiry
//!
//! [`SessionPolicy`] decides whether sessions expire and how:
//! - no TTL: sessions live until logout.
//! - absolute TTL: sessions expire a fixed time after login.
//! - sliding TTL (default, 24h): every authenticated request pushes the
//!   expiry forward by the TTL.
//!
//! Expired rows are ignored on lookup and removed by the background pruner.

mod manager;
mod memory;
mod postgres;

pub use manager::{spawn_pruner, SessionManager};
pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

use crate::storage::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Longest accepted TTL (ten years). Larger values overflow clock and
/// interval arithmetic in the stores.
pub const MAX_SESSION_TTL_SECONDS: u64 = 60 * 60 * 24 * 365 * 10;

/// What a live session resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_id: Uuid,
}

/// Persistent mapping from session hashes to user ids.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session. Returns [`StoreError::Conflict`] if the hash is
    /// already present.
    async fn create(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Return the live session for `session_hash`, if any. When `extend` is
    /// set, an expiring session's deadline moves to now + `extend`.
    async fn lookup(
        &self,
        session_hash: &[u8],
        extend: Option<Duration>,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Delete a session. Returns whether a row existed.
    async fn destroy(&self, session_hash: &[u8]) -> Result<bool, StoreError>;

    /// Delete expired sessions and return how many were removed.
    async fn prune_expired(&self) -> Result<u64, StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    ttl: Option<Duration>,
    sliding: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(DEFAULT_SESSION_TTL),
            sliding: true,
        }
    }
}

impl SessionPolicy {
    /// Sessions that never expire.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            ttl: None,
            sliding: false,
        }
    }

    #[must_use]
    pub const fn sliding(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            sliding: true,
        }
    }

    #[must_use]
    pub const fn absolute(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            sliding: false,
        }
    }

    /// Build from a TTL in seconds where `0` means "never expires". Values
    /// above [`MAX_SESSION_TTL_SECONDS`] are clamped to it.
    #[must_use]
    pub const fn from_seconds(ttl_seconds: u64, sliding: bool) -> Self {
        if ttl_seconds == 0 {
            Self::unlimited()
        } else {
            let ttl_seconds = if ttl_seconds > MAX_SESSION_TTL_SECONDS {
                MAX_SESSION_TTL_SECONDS
            } else {
                ttl_seconds
            };
            Self {
                ttl: Some(Duration::from_secs(ttl_seconds)),
                sliding,
            }
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// True only when there is a TTL to slide.
    #[must_use]
    pub const fn is_sliding(&self) -> bool {
        self.sliding && self.ttl.is_some()
    }

    /// How far a lookup should push the expiry, if at all.
    #[must_use]
    pub const fn extension(&self) -> Option<Duration> {
        if self.sliding {
            self.ttl
        } else {
            None
        }
    }
}
