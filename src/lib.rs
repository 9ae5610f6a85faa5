//! # Passgate (session-based login server)
//!
//! `passgate` authenticates users by username and password and keeps them
//! signed in with a server-side session referenced by an `HttpOnly` cookie.
//!
//! ## Credential resolution
//!
//! A login either matches an existing user by bcrypt verification, or, when
//! auto-registration is enabled, creates the user on first sight. Unknown
//! usernames still pay for a bcrypt verification so response timing does not
//! reveal which usernames exist. Two concurrent first logins for the same new
//! username produce exactly one user; the loser is resolved as a login.
//!
//! ## Session gate
//!
//! Every path outside an exact-match allow-list requires a live session.
//! Unauthenticated requests get `401` or a redirect to `/unauthorized`,
//! depending on configuration. Session store failures are `500`, never a
//! silent pass.
//!
//! ## Storage
//!
//! Users and sessions live in `PostgreSQL` (`sql/schema.sql`). In-memory
//! stores back the tests and `--in-memory` local runs.

pub mod api;
pub mod cli;
pub mod identity;
pub mod session;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
