//! Auth handlers and supporting modules.
//!
//! This module covers username/password login, logout, and the cookie-backed
//! session that ties them together.
//!
//! ## Session cookie
//!
//! `passgate_session` holds an opaque random token. Only its keyed hash is
//! stored, so a leaked session table cannot be replayed as cookies.
//!
//! ## Flash messages
//!
//! A failed login redirects to `/` with a `passgate_flash` cookie carrying a
//! fixed code. The login page renders the message once and clears the cookie.

pub(crate) mod flash;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub(crate) mod types;

pub use flash::Flash;
pub use principal::Principal;
pub use state::{AuthConfig, AuthState};

#[cfg(test)]
mod tests;
