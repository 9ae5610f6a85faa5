pub mod auth;
pub mod database;
pub mod gate;
pub mod logging;
pub mod session;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_IN_MEMORY: &str = "in-memory";
pub const ARG_SKIP_BOOTSTRAP: &str = "skip-bootstrap";

/// Validate that a database is configured unless running in memory.
///
/// # Errors
/// Returns an error string if neither `--dsn` nor `--db-name` is set and
/// `--in-memory` is off.
pub fn validate(matches: &clap::ArgMatches) -> Result<(), String> {
    if matches.get_flag(ARG_IN_MEMORY) {
        return Ok(());
    }

    let has = |id: &str| {
        matches
            .get_one::<String>(id)
            .is_some_and(|value| !value.trim().is_empty())
    };

    if has(database::ARG_DSN) || has(database::ARG_DB_NAME) {
        Ok(())
    } else {
        Err(format!(
            "Missing required argument: --{} or --{} (or --{ARG_IN_MEMORY})",
            database::ARG_DSN,
            database::ARG_DB_NAME
        ))
    }
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("passgate")
        .about("Session-based login server")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("PASSGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_IN_MEMORY)
                .long(ARG_IN_MEMORY)
                .help("Keep users and sessions in memory instead of PostgreSQL")
                .env("PASSGATE_IN_MEMORY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SKIP_BOOTSTRAP)
                .long(ARG_SKIP_BOOTSTRAP)
                .help("Do not create missing tables at startup")
                .env("PASSGATE_SKIP_BOOTSTRAP")
                .action(ArgAction::SetTrue),
        );

    let command = database::with_args(command);
    let command = session::with_args(command);
    let command = auth::with_args(command);
    let command = gate::with_args(command);
    logging::with_args(command)
}
