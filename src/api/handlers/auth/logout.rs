use crate::api::handlers::auth::{
    principal::Principal,
    session::{clear_session_cookie, extract_session_token},
    state::AuthState,
};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session destroyed and cookie cleared", body = String),
        (status = 401, description = "Not authenticated", body = String),
        (status = 500, description = "Session could not be destroyed", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    principal: Option<Extension<Principal>>,
) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = auth_state.sessions().destroy(&token).await {
            // Keep the cookie so the client still holds the live session.
            error!("Failed to destroy session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Logout failed".to_string(),
            )
                .into_response();
        }
    }

    let cookie = match clear_session_cookie(&auth_state) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build logout cookie: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Logout failed".to_string(),
            )
                .into_response();
        }
    };

    // Absent when `/logout` is on the public allow-list.
    match principal {
        Some(Extension(principal)) => info!(user_id = %principal.user_id, "Logged out"),
        None => info!("Logged out"),
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    (StatusCode::OK, response_headers, "Logged out".to_string()).into_response()
}
