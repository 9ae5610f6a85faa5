//! Username/password login.

use crate::api::handlers::auth::{
    flash::Flash,
    session::{extract_session_token, session_cookie},
    state::AuthState,
    types::{LoginPayload, LoginRequest},
};
use axum::{
    extract::Extension,
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where a successful login lands.
pub(crate) const LANDING_PATH: &str = "/hello";

/// Where a failed login lands.
pub(crate) const LOGIN_PAGE_PATH: &str = "/";

#[utoipa::path(
    post,
    path = "/login",
    request_body(
        content = LoginRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Credentials, as a form or as JSON"
    ),
    responses(
        (status = 303, description = "Redirects to the landing page with a session cookie on success, or back to the login page with a flash cookie"),
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<LoginPayload>,
) -> Response {
    let Some(LoginPayload(request)) = payload else {
        return failure(Flash::MissingCredentials);
    };

    if request.username.is_empty() || request.password.expose_secret().is_empty() {
        return failure(Flash::MissingCredentials);
    }

    let resolved = match auth_state
        .resolver()
        .resolve(&request.username, request.password)
        .await
    {
        Ok(resolved) => resolved,
        Err(err) if err.is_rejection() => {
            info!("Login rejected: {err}");
            return failure(Flash::InvalidCredentials);
        }
        Err(err) => {
            error!("Login failed: {err:#}");
            return failure(Flash::Unavailable);
        }
    };

    // A token the client arrived with must not survive the privilege change.
    if let Some(previous) = extract_session_token(&headers) {
        if let Err(err) = auth_state.sessions().destroy(&previous).await {
            warn!("Failed to destroy previous session: {err}");
        }
    }

    let token = match auth_state.sessions().establish(resolved.user.id).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to create session: {err:#}");
            return failure(Flash::Unavailable);
        }
    };

    let cookie = match session_cookie(&auth_state, &token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return failure(Flash::Unavailable);
        }
    };

    info!(
        user_id = %resolved.user.id,
        outcome = ?resolved.outcome,
        "Login succeeded"
    );

    let mut response_headers = HeaderMap::new();
    response_headers.insert(LOCATION, HeaderValue::from_static(LANDING_PATH));
    response_headers.append(SET_COOKIE, cookie);
    response_headers.append(SET_COOKIE, Flash::clear_cookie());
    (StatusCode::SEE_OTHER, response_headers).into_response()
}

fn failure(flash: Flash) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static(LOGIN_PAGE_PATH));
    headers.insert(SET_COOKIE, flash.set_cookie());
    (StatusCode::SEE_OTHER, headers).into_response()
}
