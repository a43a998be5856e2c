use clap::{Arg, Command};

pub const ARG_PASSWORD: &str = "password";
pub const ARG_SALT: &str = "salt";

/// `hash-password`: produce the salt and hash columns for a share.
#[must_use]
pub fn subcommand() -> Command {
    Command::new("hash-password")
        .about("Print salt and hash for a share password")
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Share password to hash")
                .env("SHAREGATE_SHARE_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SALT)
                .long(ARG_SALT)
                .help("Salt to use instead of a freshly generated one"),
        )
}
