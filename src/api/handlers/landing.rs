use super::auth::Principal;
use crate::api::pages;
use axum::{extract::Extension, response::Html};

/// `GET /hello`, reachable only through the session gate.
pub async fn hello(principal: Extension<Principal>) -> Html<String> {
    Html(pages::landing_page(&principal.username))
}
