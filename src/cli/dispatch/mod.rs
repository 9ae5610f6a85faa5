//! Command-line argument dispatch.
//!
//! Validated matches become an [`Action`] carrying the full server
//! configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{
    self, auth, database, gate, session, ARG_IN_MEMORY, ARG_PORT, ARG_SKIP_BOOTSTRAP,
};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    commands::validate(matches).map_err(|e| anyhow::anyhow!(e))?;

    let in_memory = matches.get_flag(ARG_IN_MEMORY);
    let dsn = if in_memory {
        None
    } else {
        Some(database::Options::parse(matches)?.connection_string()?)
    };

    Ok(Action::Server(Args {
        port,
        dsn,
        skip_bootstrap: matches.get_flag(ARG_SKIP_BOOTSTRAP),
        session: session::Options::parse(matches)?,
        auth: auth::Options::parse(matches),
        gate: gate::Options::parse(matches),
    }))
}
