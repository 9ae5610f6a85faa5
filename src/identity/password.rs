//! bcrypt hashing and verification.
//!
//! Both operations are CPU bound (tens of milliseconds at cost 10), so they
//! run on the blocking pool and never stall the request executor.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::spawn_blocking;
use tracing::warn;

pub const DEFAULT_COST: u32 = 10;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Hash a password with a fresh random salt.
///
/// # Errors
/// Returns an error if the cost is out of range or the blocking task panics.
pub async fn hash(password: SecretString, cost: u32) -> Result<String> {
    spawn_blocking(move || bcrypt::hash(password.expose_secret(), cost))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")
}

/// Verify a password against a stored bcrypt hash in constant time.
///
/// A stored value that is not a bcrypt hash never matches.
///
/// # Errors
/// Returns an error only if the blocking task panics.
pub async fn verify(password: SecretString, password_hash: String) -> Result<bool> {
    let outcome = spawn_blocking(move || bcrypt::verify(password.expose_secret(), &password_hash))
        .await
        .context("password verification task failed")?;

    match outcome {
        Ok(valid) => Ok(valid),
        Err(err) => {
            warn!("Stored password is not a valid bcrypt hash: {err}");
            Ok(false)
        }
    }
}
