use super::auth::AuthState;
use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "User store is reachable", body = [Health]),
        (status = 503, description = "User store is unreachable", body = [Health])
    ),
    tag= "passgate"
)]
// axum handler for health
pub async fn health(method: Method, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let result = match auth_state.users().ping().await {
        Ok(()) => Ok(()),
        Err(error) => {
            error!("Failed to ping user store: {}", error);

            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    match result {
        Ok(()) => (StatusCode::OK, headers, body),
        Err(status) => (status, headers, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::handlers::auth::AuthConfig,
        identity::{CredentialResolver, MemoryUserStore, ResolverConfig, UserStore},
        session::{MemorySessionStore, SessionManager, SessionPolicy},
        storage::StoreError,
    };
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::{body::to_bytes, routing::get, Router};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct DownStore;

    #[async_trait]
    impl UserStore for DownStore {
        async fn find_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<crate::identity::StoredUser>, StoreError> {
            Err(StoreError::Backend(anyhow!("down")))
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<Option<crate::identity::User>, StoreError> {
            Err(StoreError::Backend(anyhow!("down")))
        }

        async fn insert(
            &self,
            _username: &str,
            _password_hash: &str,
        ) -> Result<crate::identity::StoredUser, StoreError> {
            Err(StoreError::Backend(anyhow!("down")))
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Backend(anyhow!("down")))
        }
    }

    fn app(users: Arc<dyn UserStore>) -> Result<Router> {
        let resolver = CredentialResolver::new(users.clone(), ResolverConfig::new());
        let sessions = SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            SessionPolicy::default(),
            &SecretString::from("secret".to_string()),
        )?;
        let state = AuthState::new(AuthConfig::new(), users, resolver, sessions);
        Ok(Router::new()
            .route("/health", get(health))
            .layer(Extension(Arc::new(state))))
    }

    #[tokio::test]
    async fn health_reports_ok_with_x_app_header() -> Result<()> {
        let response = app(Arc::new(MemoryUserStore::new()))?
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let x_app = response
            .headers()
            .get("X-App")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(x_app.starts_with(&format!(
            "{}:{}:",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.database, "ok");
        assert_eq!(health.commit, GIT_COMMIT_HASH);
        Ok(())
    }

    #[tokio::test]
    async fn health_reports_unavailable_when_store_is_down() -> Result<()> {
        let response = app(Arc::new(DownStore))?
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.database, "error");
        Ok(())
    }
}
