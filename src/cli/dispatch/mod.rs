//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{Action, hash_password, server};
use crate::cli::commands::{CMD_HASH_PASSWORD, CMD_SERVER, password, render, unlock};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_SERVER, sub)) => server_args(sub).map(Action::Server),
        Some((CMD_HASH_PASSWORD, sub)) => {
            let password = sub
                .get_one::<String>(password::ARG_PASSWORD)
                .map(|password| SecretString::from(password.clone()))
                .context("missing required argument: --password")?;
            let salt = sub
                .get_one::<String>(password::ARG_SALT)
                .cloned()
                .filter(|salt| !salt.is_empty());
            Ok(Action::HashPassword(hash_password::Args { password, salt }))
        }
        Some((other, _)) => bail!("unknown subcommand: {other}"),
        None => bail!("missing subcommand"),
    }
}

fn server_args(matches: &ArgMatches) -> Result<server::Args> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let unlock_opts = unlock::Options::parse(matches)?;
    let render_opts = render::Options::parse(matches)?;

    Ok(server::Args {
        port,
        dsn,
        unlock_secret: unlock_opts.secret,
        max_failed_attempts: unlock_opts.max_failed_attempts,
        lockout_seconds: unlock_opts.lockout_seconds,
        unlock_ttl_seconds: unlock_opts.ttl_seconds,
        render_url: render_opts.url,
    })
}
