//! API handlers for passgate.
//!
//! `auth` owns login, logout and the session cookie. The remaining modules
//! serve the HTML pages and the health probe.

pub mod auth;
pub mod health;
pub mod landing;
pub mod root;
