use crate::identity::{password, ResolverConfig};
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_AUTO_REGISTER: &str = "auto-register";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[derive(Debug, Clone)]
pub struct Options {
    pub auto_register: bool,
    pub bcrypt_cost: u32,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            auto_register: matches.get_flag(ARG_AUTO_REGISTER),
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(password::DEFAULT_COST),
        }
    }

    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new()
            .with_auto_register_unknown_users(self.auto_register)
            .with_bcrypt_cost(self.bcrypt_cost)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTO_REGISTER)
                .long(ARG_AUTO_REGISTER)
                .help("Create an account the first time an unknown username signs in")
                .env("PASSGATE_AUTO_REGISTER")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt work factor for new password hashes (4-31)")
                .env("PASSGATE_BCRYPT_COST")
                .default_value("10")
                .value_parser(
                    clap::value_parser!(u32)
                        .range(i64::from(password::MIN_COST)..=i64::from(password::MAX_COST)),
                ),
        )
}
