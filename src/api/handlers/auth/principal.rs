//! Authenticated principal extraction.
//!
//! Flow Overview: read the session cookie, resolve it to a live session, then
//! resolve the session's user id to a user. A session whose user no longer
//! exists counts as no session at all.

use axum::http::{HeaderMap, StatusCode};
use tracing::error;
use uuid::Uuid;

use super::{session::extract_session_token, state::AuthState};

/// Authenticated user context, inserted into request extensions by the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
}

/// A live session together with the raw token it was found under.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub(crate) token: String,
    pub(crate) principal: Principal,
}

/// Resolve the request's session cookie.
///
/// Returns `Ok(None)` when the cookie is missing, unknown, expired, or points
/// at a user that no longer exists. Store failures map to 500.
pub(crate) async fn active_session(
    headers: &HeaderMap,
    auth_state: &AuthState,
) -> Result<Option<ActiveSession>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };

    let record = match auth_state.sessions().authenticate(&token).await {
        Ok(Some(record)) => record,
        Ok(None) => return Ok(None),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    match auth_state.users().find_by_id(record.user_id).await {
        Ok(Some(user)) => Ok(Some(ActiveSession {
            token,
            principal: Principal {
                user_id: user.id,
                username: user.username,
            },
        })),
        Ok(None) => Ok(None),
        Err(err) => {
            error!("Failed to lookup session user: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
