//! Auth module tests.

use super::{
    login::{login, LANDING_PATH, LOGIN_PAGE_PATH},
    logout::logout,
    AuthConfig, AuthState, Principal,
};
use crate::{
    identity::{password, CredentialResolver, MemoryUserStore, ResolverConfig, UserStore},
    session::{MemorySessionStore, SessionManager, SessionPolicy, SessionRecord, SessionStore},
    storage::StoreError,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    routing::post,
    Extension, Router,
};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;
use uuid::Uuid;

struct Harness {
    users: Arc<MemoryUserStore>,
    sessions: Arc<MemorySessionStore>,
    state: Arc<AuthState>,
}

fn harness(auto_register: bool) -> Result<Harness> {
    let users = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(MemorySessionStore::new());
    let state = auth_state(users.clone(), sessions.clone(), auto_register)?;
    Ok(Harness {
        users,
        sessions,
        state,
    })
}

fn auth_state(
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    auto_register: bool,
) -> Result<Arc<AuthState>> {
    let resolver = CredentialResolver::new(
        users.clone(),
        ResolverConfig::new()
            .with_auto_register_unknown_users(auto_register)
            .with_bcrypt_cost(password::MIN_COST),
    );
    let manager = SessionManager::new(
        sessions,
        SessionPolicy::sliding(Duration::from_secs(3600)),
        &SecretString::from("test-session-secret".to_string()),
    )?;
    Ok(Arc::new(AuthState::new(
        AuthConfig::new(),
        users,
        resolver,
        manager,
    )))
}

async fn seed_user(users: &MemoryUserStore, username: &str, password: &str) -> Result<Uuid> {
    let hash = password::hash(
        SecretString::from(password.to_string()),
        password::MIN_COST,
    )
    .await?;
    Ok(users.insert(username, &hash).await?.user.id)
}

fn login_router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .layer(Extension(state))
}

fn form_login(body: &'static str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/login")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::from(body))?)
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
}

fn session_token(response: &Response) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        cookie
            .strip_prefix("passgate_session=")
            .and_then(|rest| rest.split(';').next())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

#[tokio::test]
async fn form_login_with_known_user_sets_session_cookie() -> Result<()> {
    let harness = harness(false)?;
    seed_user(&harness.users, "alice", "pw1").await?;

    let response = login_router(harness.state.clone())
        .oneshot(form_login("username=alice&password=pw1", None)?)
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(LANDING_PATH));
    let token = session_token(&response).ok_or_else(|| anyhow!("missing session cookie"))?;
    assert!(harness.state.sessions().authenticate(&token).await?.is_some());
    assert_eq!(harness.sessions.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn json_login_registers_unknown_user_when_enabled() -> Result<()> {
    let harness = harness(true)?;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"bob","password":"pw2"}"#))?;
    let response = login_router(harness.state.clone()).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(LANDING_PATH));
    assert!(session_token(&response).is_some());
    assert_eq!(harness.users.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn wrong_password_redirects_with_invalid_credentials_flash() -> Result<()> {
    let harness = harness(false)?;
    seed_user(&harness.users, "alice", "pw1").await?;

    let response = login_router(harness.state.clone())
        .oneshot(form_login("username=alice&password=nope", None)?)
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(LOGIN_PAGE_PATH));
    let cookies = set_cookies(&response);
    assert!(cookies
        .iter()
        .any(|cookie| cookie.starts_with("passgate_flash=invalid_credentials")));
    assert!(session_token(&response).is_none());
    assert!(harness.sessions.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn unknown_user_gets_same_flash_as_wrong_password() -> Result<()> {
    let harness = harness(false)?;

    let response = login_router(harness.state.clone())
        .oneshot(form_login("username=ghost&password=pw", None)?)
        .await?;

    assert_eq!(location(&response), Some(LOGIN_PAGE_PATH));
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("passgate_flash=invalid_credentials")));
    assert!(harness.users.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn empty_fields_redirect_with_missing_credentials_flash() -> Result<()> {
    let harness = harness(true)?;

    for body in ["username=&password=pw", "username=alice&password=", "username=alice"] {
        let response = login_router(harness.state.clone())
            .oneshot(form_login(body, None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(set_cookies(&response)
            .iter()
            .any(|cookie| cookie.starts_with("passgate_flash=missing_credentials")));
    }
    assert!(harness.users.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn unreadable_body_is_treated_as_missing_credentials() -> Result<()> {
    let harness = harness(true)?;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let response = login_router(harness.state.clone()).oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("passgate_flash=missing_credentials")));
    Ok(())
}

#[tokio::test]
async fn login_replaces_session_presented_by_client() -> Result<()> {
    let harness = harness(false)?;
    let user_id = seed_user(&harness.users, "alice", "pw1").await?;
    let planted = harness.state.sessions().establish(user_id).await?;

    let cookie = format!("passgate_session={planted}");
    let response = login_router(harness.state.clone())
        .oneshot(form_login("username=alice&password=pw1", Some(&cookie))?)
        .await?;

    let fresh = session_token(&response).ok_or_else(|| anyhow!("missing session cookie"))?;
    assert_ne!(fresh, planted);
    assert!(harness.state.sessions().authenticate(&planted).await?.is_none());
    assert!(harness.state.sessions().authenticate(&fresh).await?.is_some());
    Ok(())
}

fn logout_router(state: Arc<AuthState>, principal: Principal) -> Router {
    Router::new()
        .route("/logout", post(logout))
        .layer(Extension(principal))
        .layer(Extension(state))
}

fn logout_request(token: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/logout")
        .header(COOKIE, format!("passgate_session={token}"))
        .body(Body::empty())?)
}

#[tokio::test]
async fn logout_destroys_session_and_clears_cookie() -> Result<()> {
    let harness = harness(false)?;
    let user_id = seed_user(&harness.users, "alice", "pw1").await?;
    let token = harness.state.sessions().establish(user_id).await?;
    let principal = Principal {
        user_id,
        username: "alice".to_string(),
    };

    let response = logout_router(harness.state.clone(), principal)
        .oneshot(logout_request(&token)?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("passgate_session=;") && cookie.contains("Max-Age=0")));
    assert!(harness.state.sessions().authenticate(&token).await?.is_none());
    Ok(())
}

/// Session store whose deletes always fail.
struct FailingDestroy {
    inner: MemorySessionStore,
}

#[async_trait]
impl SessionStore for FailingDestroy {
    async fn create(
        &self,
        session_hash: &[u8],
        user_id: Uuid,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.inner.create(session_hash, user_id, ttl).await
    }

    async fn lookup(
        &self,
        session_hash: &[u8],
        extend: Option<Duration>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.lookup(session_hash, extend).await
    }

    async fn destroy(&self, _session_hash: &[u8]) -> Result<bool, StoreError> {
        Err(StoreError::Backend(anyhow!("connection reset")))
    }

    async fn prune_expired(&self) -> Result<u64, StoreError> {
        self.inner.prune_expired().await
    }
}

#[tokio::test]
async fn logout_failure_keeps_cookie() -> Result<()> {
    let users = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(FailingDestroy {
        inner: MemorySessionStore::new(),
    });
    let state = auth_state(users.clone(), sessions, false)?;
    let user_id = seed_user(&users, "alice", "pw1").await?;
    let token = state.sessions().establish(user_id).await?;
    let principal = Principal {
        user_id,
        username: "alice".to_string(),
    };

    let response = logout_router(state.clone(), principal)
        .oneshot(logout_request(&token)?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookies(&response).is_empty());
    assert!(state.sessions().authenticate(&token).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn logout_without_gate_principal_still_destroys_session() -> Result<()> {
    let harness = harness(false)?;
    let user_id = seed_user(&harness.users, "alice", "pw1").await?;
    let token = harness.state.sessions().establish(user_id).await?;

    let router = Router::new()
        .route("/logout", post(logout))
        .layer(Extension(harness.state.clone()));
    let response = router.oneshot(logout_request(&token)?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response)
        .iter()
        .any(|cookie| cookie.starts_with("passgate_session=;")));
    assert!(harness.state.sessions().authenticate(&token).await?.is_none());
    Ok(())
}
