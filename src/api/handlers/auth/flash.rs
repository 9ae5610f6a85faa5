//! One-shot messages carried from a failed login to the next login page.
//!
//! The cookie only ever holds a fixed code; the text shown to the user comes
//! from [`Flash::message`], so nothing request-controlled is reflected.

use axum::http::{HeaderMap, HeaderValue};

use super::session::cookie_value;

pub(crate) const FLASH_COOKIE_NAME: &str = "passgate_flash";

const CLEAR_FLASH_COOKIE: &str = "passgate_flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flash {
    InvalidCredentials,
    MissingCredentials,
    Unavailable,
}

impl Flash {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::MissingCredentials => "missing_credentials",
            Self::Unavailable => "unavailable",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_credentials" => Some(Self::InvalidCredentials),
            "missing_credentials" => Some(Self::MissingCredentials),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Invalid username or password.",
            Self::MissingCredentials => "Username and password are required.",
            Self::Unavailable => "Sign-in is temporarily unavailable. Please try again.",
        }
    }

    /// `Set-Cookie` value that arms this flash for the next page load.
    #[must_use]
    pub const fn set_cookie(self) -> HeaderValue {
        HeaderValue::from_static(match self {
            Self::InvalidCredentials => {
                "passgate_flash=invalid_credentials; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
            }
            Self::MissingCredentials => {
                "passgate_flash=missing_credentials; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
            }
            Self::Unavailable => {
                "passgate_flash=unavailable; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
            }
        })
    }

    /// Read the pending flash, if the request carries one.
    #[must_use]
    pub fn take(headers: &HeaderMap) -> Option<Self> {
        cookie_value(headers, FLASH_COOKIE_NAME).and_then(|code| Self::from_code(&code))
    }

    #[must_use]
    pub const fn clear_cookie() -> HeaderValue {
        HeaderValue::from_static(CLEAR_FLASH_COOKIE)
    }
}
