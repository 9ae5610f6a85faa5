use crate::{
    api::{
        gate::{require_session, Gate, GateConfig, UNAUTHORIZED_PATH},
        handlers::{landing, root},
    },
    identity::{CredentialResolver, MemoryUserStore, PgUserStore, ResolverConfig, UserStore},
    session::{
        spawn_pruner, MemorySessionStore, PgSessionStore, SessionManager, SessionPolicy,
        SessionStore,
    },
    storage,
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::get,
    Extension, Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod gate;
pub mod handlers;
mod openapi;
pub mod pages;

pub use handlers::auth::{AuthConfig, AuthState, Flash, Principal};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Where users and sessions live.
#[derive(Debug)]
pub enum Storage {
    Postgres { dsn: SecretString, bootstrap: bool },
    InMemory,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub storage: Storage,
    pub session_secret: SecretString,
    pub session_policy: SessionPolicy,
    pub prune_interval: Duration,
    pub resolver: ResolverConfig,
    pub auth: AuthConfig,
    pub gate: GateConfig,
}

/// Assemble the full application: documented routes, HTML pages, the session
/// gate, and the request-id/trace stack.
#[must_use]
pub fn app(auth_state: Arc<AuthState>, gate_config: GateConfig) -> Router {
    let gate = Arc::new(Gate::new(gate_config, auth_state.clone()));

    let (router, _openapi) = router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/hello", get(landing::hello))
        .route(UNAUTHORIZED_PATH, get(root::unauthorized))
        .layer(from_fn_with_state(gate, require_session))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(auth_state)),
        )
}

/// Start the server
/// # Errors
/// Return error if storage cannot be reached or the listener fails
pub async fn new(config: ServerConfig) -> Result<()> {
    let (users, sessions, pool) = match config.storage {
        Storage::Postgres { dsn, bootstrap } => {
            let pool = storage::connect(dsn.expose_secret()).await?;
            if bootstrap {
                storage::bootstrap(&pool).await?;
            }
            let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
            let sessions: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
            (users, sessions, Some(pool))
        }
        Storage::InMemory => {
            warn!("Using in-memory storage, users and sessions are lost on exit");
            let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            (users, sessions, None)
        }
    };

    let resolver = CredentialResolver::new(users.clone(), config.resolver);
    let sessions_manager =
        SessionManager::new(sessions.clone(), config.session_policy, &config.session_secret)?;
    let auth_state = Arc::new(AuthState::new(
        config.auth,
        users,
        resolver,
        sessions_manager,
    ));

    let pruner = spawn_pruner(sessions, config.prune_interval);

    let app = app(auth_state, config.gate);

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pruner) = pruner {
        pruner.abort();
    }

    if let Some(pool) = pool {
        pool.close().await;
    }

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
