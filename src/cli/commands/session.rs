use crate::{
    api::AuthConfig,
    session::{SessionPolicy, MAX_SESSION_TTL_SECONDS},
};
use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_ABSOLUTE_EXPIRY: &str = "session-absolute-expiry";
pub const ARG_SESSION_PRUNE_SECONDS: &str = "session-prune-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: SecretString,
    pub ttl_seconds: u64,
    pub absolute_expiry: bool,
    pub prune_seconds: u64,
    pub cookie_secure: bool,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the session secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .cloned()
            .map(SecretString::from);
        let secret = match secret {
            Some(value) if !value.expose_secret().trim().is_empty() => value,
            _ => bail!("missing required argument: --{ARG_SESSION_SECRET}"),
        };

        Ok(Self {
            secret,
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(86_400),
            absolute_expiry: matches.get_flag(ARG_SESSION_ABSOLUTE_EXPIRY),
            prune_seconds: matches
                .get_one::<u64>(ARG_SESSION_PRUNE_SECONDS)
                .copied()
                .unwrap_or(900),
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
        })
    }

    #[must_use]
    pub const fn policy(&self) -> SessionPolicy {
        SessionPolicy::from_seconds(self.ttl_seconds, !self.absolute_expiry)
    }

    #[must_use]
    pub const fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_seconds)
    }

    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new().with_session_cookie_secure(self.cookie_secure)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to hash session tokens")
                .long_help(
                    "Secret used to key the hash of session tokens before they are stored.\n\nChanging it signs everyone out.",
                )
                .env("PASSGATE_SESSION_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds, 0 for sessions that never expire (max ten years)")
                .env("PASSGATE_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(0..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_ABSOLUTE_EXPIRY)
                .long(ARG_SESSION_ABSOLUTE_EXPIRY)
                .help("Expire sessions a fixed time after login instead of after inactivity")
                .env("PASSGATE_SESSION_ABSOLUTE_EXPIRY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_PRUNE_SECONDS)
                .long(ARG_SESSION_PRUNE_SECONDS)
                .help("Interval between expired session cleanups, 0 to disable")
                .env("PASSGATE_SESSION_PRUNE_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("PASSGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
}
