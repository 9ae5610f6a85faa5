use super::{SessionPolicy, SessionRecord, SessionStore};
use crate::storage::StoreError;
use anyhow::{anyhow, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;
const CREATE_ATTEMPTS: usize = 3;

/// Creates, resolves and destroys sessions on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    policy: SessionPolicy,
    mac: HmacSha256,
}

impl SessionManager {
    /// # Errors
    /// Returns an error if the session secret is empty.
    pub fn new(
        store: Arc<dyn SessionStore>,
        policy: SessionPolicy,
        secret: &SecretString,
    ) -> Result<Self> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(anyhow!("session secret must not be empty"));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("invalid session secret"))?;
        Ok(Self { store, policy, mac })
    }

    #[must_use]
    pub const fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Start a session for `user_id` and return the raw token for the cookie.
    ///
    /// # Errors
    /// Returns an error if randomness is unavailable or the store fails.
    pub async fn establish(&self, user_id: Uuid) -> Result<String> {
        for _ in 0..CREATE_ATTEMPTS {
            let token = generate_session_token()?;
            match self
                .store
                .create(&self.hash_token(&token), user_id, self.policy.ttl())
                .await
            {
                Ok(()) => return Ok(token),
                Err(StoreError::Conflict) => {}
                Err(StoreError::Backend(err)) => {
                    return Err(err.context("failed to create session"));
                }
            }
        }

        Err(anyhow!("failed to generate unique session token"))
    }

    /// Resolve a raw token to its live session, sliding the expiry when the
    /// policy asks for it.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn authenticate(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.store
            .lookup(&self.hash_token(token), self.policy.extension())
            .await
    }

    /// # Errors
    /// Returns an error if the store fails; the session is then left intact.
    pub async fn destroy(&self, token: &str) -> Result<bool, StoreError> {
        self.store.destroy(&self.hash_token(token)).await
    }

    fn hash_token(&self, token: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// 32 random bytes, base64url without padding (cookie safe).
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Periodically delete expired sessions. Returns `None` when `interval` is zero.
pub fn spawn_pruner(store: Arc<dyn SessionStore>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.prune_expired().await {
                Ok(0) => {}
                Ok(pruned) => debug!(pruned, "pruned expired sessions"),
                Err(err) => error!("Failed to prune expired sessions: {err}"),
            }
        }
    }))
}
