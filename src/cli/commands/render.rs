use clap::{Arg, ArgMatches, Command};

pub const ARG_RENDER_URL: &str = "render-url";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if the render service URL is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        match matches.get_one::<String>(ARG_RENDER_URL) {
            Some(url) if !url.trim().is_empty() => Ok(Self { url: url.clone() }),
            _ => anyhow::bail!("missing required argument: --{ARG_RENDER_URL}"),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_RENDER_URL)
            .long(ARG_RENDER_URL)
            .help("Base URL of the report rendering service")
            .long_help(
                "Base URL of the report rendering service.\n\nDocuments are fetched with `POST {url}/v1/render` once a viewer has access.",
            )
            .env("SHAREGATE_RENDER_URL")
            .required(true),
    )
}
