//! Shared state for the auth handlers and the session gate.

use crate::{
    identity::{CredentialResolver, UserStore},
    session::SessionManager,
};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    session_cookie_secure: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark session cookies `Secure`; enable when served over HTTPS.
    #[must_use]
    pub const fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub const fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }
}

pub struct AuthState {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    resolver: CredentialResolver,
    sessions: SessionManager,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        resolver: CredentialResolver,
        sessions: SessionManager,
    ) -> Self {
        Self {
            config,
            users,
            resolver,
            sessions,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub const fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_defaults_to_insecure_cookie() {
        assert!(!AuthConfig::new().session_cookie_secure());
        assert!(AuthConfig::new()
            .with_session_cookie_secure(true)
            .session_cookie_secure());
    }
}
