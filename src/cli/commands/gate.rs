use crate::api::gate::{GateConfig, RejectionMode, DEFAULT_PUBLIC_PATHS};
use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_UNAUTHORIZED_MODE: &str = "unauthorized-mode";
pub const ARG_PUBLIC_PATH: &str = "public-path";

#[must_use]
pub fn validator_rejection_mode() -> ValueParser {
    ValueParser::from(|mode: &str| mode.parse::<RejectionMode>())
}

#[derive(Debug, Clone)]
pub struct Options {
    pub rejection_mode: RejectionMode,
    pub public_paths: Vec<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let public_paths = matches
            .get_many::<String>(ARG_PUBLIC_PATH)
            .map(|paths| {
                paths
                    .map(|path| path.trim().to_string())
                    .filter(|path| !path.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect());

        Self {
            rejection_mode: matches
                .get_one::<RejectionMode>(ARG_UNAUTHORIZED_MODE)
                .copied()
                .unwrap_or_default(),
            public_paths,
        }
    }

    #[must_use]
    pub fn gate_config(&self) -> GateConfig {
        GateConfig::new()
            .with_public_paths(self.public_paths.iter().cloned())
            .with_rejection_mode(self.rejection_mode)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UNAUTHORIZED_MODE)
                .long(ARG_UNAUTHORIZED_MODE)
                .help("Answer unauthenticated requests with 401 (status) or a redirect to /unauthorized (redirect)")
                .env("PASSGATE_UNAUTHORIZED_MODE")
                .default_value("status")
                .value_parser(validator_rejection_mode()),
        )
        .arg(
            Arg::new(ARG_PUBLIC_PATH)
                .long(ARG_PUBLIC_PATH)
                .help("Paths served without a session, matched exactly (repeat or comma separate)")
                .env("PASSGATE_PUBLIC_PATHS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
}
