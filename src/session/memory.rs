//! In-process session store for tests and `--in-memory` local runs.
//!
//! Uses `tokio::time::Instant` so tests can drive expiry with a paused clock.

use super::{SessionRecord, SessionStore};
use crate::storage::StoreError;
use anyhow::anyhow;
use async_trait::async_trait;
use std::{
    collections::{hash_map::Entry, HashMap},
    time::Duration,
};
use tokio::{sync::RwLock, time::Instant};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct StoredSession {
    user_id: Uuid,
    expires_at: Option<Instant>,
}

fn deadline(now: Instant, ttl: Duration) -> Result<Instant, StoreError> {
    now.checked_add(ttl).ok_or_else(|| {
        StoreError::Backend(anyhow!(
            "session ttl of {}s overflows the clock",
            ttl.as_secs()
        ))
    })
}

impl StoredSession {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Vec<u8>, StoredSession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| deadline(Instant::now(), ttl)).transpose()?;
        let mut sessions = self.sessions.write().await;
        match sessions.entry(session_hash.to_vec()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(StoredSession {
                    user_id,
                    expires_at,
                });
                Ok(())
            }
        }
    }

    async fn lookup(
        &self,
        session_hash: &[u8],
        extend: Option<Duration>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(session_hash) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            return Ok(None);
        }
        if let (Some(extend), Some(_)) = (extend, entry.expires_at) {
            entry.expires_at = Some(deadline(now, extend)?);
        }
        Ok(Some(SessionRecord {
            user_id: entry.user_id,
        }))
    }

    async fn destroy(&self, session_hash: &[u8]) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(session_hash).is_some())
    }

    async fn prune_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.is_live(now));
        Ok((before - sessions.len()) as u64)
    }
}
