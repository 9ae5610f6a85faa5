//! Public pages: the login form and the redirect-mode rejection page.

use super::auth::{
    login::LANDING_PATH,
    principal::active_session,
    session::session_cookie,
    AuthState, Flash,
};
use crate::api::pages;
use axum::{
    extract::Extension,
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

/// `GET /`: signed-in users go to the landing page, everyone else sees the
/// login form along with any pending flash message.
pub async fn root(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    // A lookup failure is logged inside and falls through to the form.
    if let Ok(Some(session)) = active_session(&headers, &auth_state).await {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(LOCATION, HeaderValue::from_static(LANDING_PATH));
        // The lookup slid the stored expiry; keep the cookie's Max-Age in step.
        if auth_state.sessions().policy().is_sliding() {
            match session_cookie(&auth_state, &session.token) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                }
                Err(err) => error!("Failed to refresh session cookie: {err}"),
            }
        }
        return (StatusCode::SEE_OTHER, response_headers).into_response();
    }

    let flash = Flash::take(&headers);
    let page = Html(pages::login_page(flash.map(Flash::message)));
    if flash.is_some() {
        let mut response_headers = HeaderMap::new();
        response_headers.insert(SET_COOKIE, Flash::clear_cookie());
        (response_headers, page).into_response()
    } else {
        page.into_response()
    }
}

/// `GET /unauthorized`
pub async fn unauthorized() -> impl IntoResponse {
    (StatusCode::UNAUTHORIZED, Html(pages::unauthorized_page()))
}
