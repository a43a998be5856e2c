use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::api::handlers::share::{
    credential::DEFAULT_UNLOCK_TTL_SECONDS,
    gate::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_FAILED_ATTEMPTS},
};

pub const ARG_UNLOCK_SECRET: &str = "unlock-secret";
pub const ARG_MAX_FAILED_ATTEMPTS: &str = "max-failed-attempts";
pub const ARG_LOCKOUT_SECONDS: &str = "lockout-seconds";
pub const ARG_UNLOCK_TTL_SECONDS: &str = "unlock-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: SecretString,
    pub max_failed_attempts: u32,
    pub lockout_seconds: i64,
    pub ttl_seconds: i64,
}

impl Options {
    /// Parse password gate and unlock cookie arguments.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = match matches.get_one::<String>(ARG_UNLOCK_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_UNLOCK_SECRET}"),
        };

        Ok(Self {
            secret,
            max_failed_attempts: matches
                .get_one::<u32>(ARG_MAX_FAILED_ATTEMPTS)
                .copied()
                .unwrap_or(DEFAULT_MAX_FAILED_ATTEMPTS),
            lockout_seconds: matches
                .get_one::<i64>(ARG_LOCKOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_LOCKOUT_SECONDS),
            ttl_seconds: matches
                .get_one::<i64>(ARG_UNLOCK_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_UNLOCK_TTL_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_UNLOCK_SECRET)
                .long(ARG_UNLOCK_SECRET)
                .help("Secret used to sign unlock cookies")
                .long_help(
                    "Secret used to sign unlock cookies (HMAC-SHA256).\n\nRotating it invalidates every outstanding unlock cookie.",
                )
                .env("SHAREGATE_UNLOCK_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_MAX_FAILED_ATTEMPTS)
                .long(ARG_MAX_FAILED_ATTEMPTS)
                .help("Consecutive wrong passwords before a share locks")
                .env("SHAREGATE_MAX_FAILED_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_SECONDS)
                .long(ARG_LOCKOUT_SECONDS)
                .help("How long a locked share rejects unlock attempts")
                .env("SHAREGATE_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_UNLOCK_TTL_SECONDS)
                .long(ARG_UNLOCK_TTL_SECONDS)
                .help("Unlock cookie lifetime in seconds")
                .env("SHAREGATE_UNLOCK_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
