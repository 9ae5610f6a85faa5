//! Session gate.
//!
//! Every request passes through [`require_session`]. Allow-listed paths go
//! straight to their handler; everything else needs a live session, whose
//! [`Principal`] is then available to handlers as an `Extension`.
//!
//! Paths match byte-for-byte: `/login` is public, `/login/` and
//! `/login/anything` are not.

use super::handlers::auth::{
    principal::{active_session, ActiveSession},
    session::{session_cookie, SESSION_COOKIE_NAME},
    AuthState, Principal,
};
use axum::{
    extract::{Request, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::BTreeSet, fmt, str::FromStr, sync::Arc};
use tracing::{debug, error};

pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

pub const DEFAULT_PUBLIC_PATHS: [&str; 4] = ["/", "/login", "/favicon.ico", "/health"];

/// What an unauthenticated request to a protected path gets back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RejectionMode {
    /// `401` with a plain-text body.
    #[default]
    Status,
    /// `303` to [`UNAUTHORIZED_PATH`].
    Redirect,
}

impl FromStr for RejectionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "redirect" => Ok(Self::Redirect),
            other => Err(format!(
                "invalid unauthorized mode '{other}', expected 'status' or 'redirect'"
            )),
        }
    }
}

impl fmt::Display for RejectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Status => "status",
            Self::Redirect => "redirect",
        })
    }
}

#[derive(Clone, Debug)]
pub struct GateConfig {
    public_paths: BTreeSet<String>,
    rejection_mode: RejectionMode,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect(),
            rejection_mode: RejectionMode::default(),
        }
    }
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allow-list.
    #[must_use]
    pub fn with_public_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_rejection_mode(mut self, mode: RejectionMode) -> Self {
        self.rejection_mode = mode;
        self
    }

    #[must_use]
    pub const fn rejection_mode(&self) -> RejectionMode {
        self.rejection_mode
    }

    pub fn public_paths(&self) -> impl Iterator<Item = &str> {
        self.public_paths.iter().map(String::as_str)
    }

    /// Exact match against the allow-list. The rejection page is public
    /// whenever redirects point at it.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.contains(path)
            || (self.rejection_mode == RejectionMode::Redirect && path == UNAUTHORIZED_PATH)
    }
}

pub(crate) enum GateDecision {
    Allowed,
    Authenticated(ActiveSession),
    Rejected,
}

pub struct Gate {
    config: GateConfig,
    auth: Arc<AuthState>,
}

impl Gate {
    #[must_use]
    pub fn new(config: GateConfig, auth: Arc<AuthState>) -> Self {
        Self { config, auth }
    }

    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide a request. `Err` carries the status for a store failure, which
    /// never counts as authenticated.
    pub(crate) async fn check(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<GateDecision, StatusCode> {
        if self.config.is_public(path) {
            return Ok(GateDecision::Allowed);
        }

        Ok(match active_session(headers, &self.auth).await? {
            Some(session) => GateDecision::Authenticated(session),
            None => GateDecision::Rejected,
        })
    }

    fn reject(&self) -> Response {
        match self.config.rejection_mode {
            RejectionMode::Status => {
                (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()).into_response()
            }
            RejectionMode::Redirect => {
                let mut headers = HeaderMap::new();
                headers.insert(LOCATION, HeaderValue::from_static(UNAUTHORIZED_PATH));
                (StatusCode::SEE_OTHER, headers).into_response()
            }
        }
    }
}

/// Middleware enforcing the session gate.
pub async fn require_session(
    State(gate): State<Arc<Gate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let session = match gate.check(&path, request.headers()).await {
        Ok(GateDecision::Allowed) => return next.run(request).await,
        Ok(GateDecision::Authenticated(session)) => session,
        Ok(GateDecision::Rejected) => {
            debug!(path = %path, "Rejected unauthenticated request");
            return gate.reject();
        }
        Err(status) => {
            return (status, "Session lookup failed".to_string()).into_response();
        }
    };

    let ActiveSession { token, principal } = session;
    request.extensions_mut().insert::<Principal>(principal);

    let mut response = next.run(request).await;

    if gate.auth.sessions().policy().is_sliding() && !sets_session_cookie(response.headers()) {
        match session_cookie(&gate.auth, &token) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to refresh session cookie: {err}"),
        }
    }

    response
}

fn sets_session_cookie(headers: &HeaderMap) -> bool {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}
