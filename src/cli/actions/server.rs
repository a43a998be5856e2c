use crate::api::{
    self,
    handlers::share::{GatePolicy, HttpReportRenderer, PgShareStore, ShareState, UnlockSigner},
};
use crate::cli::telemetry;
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub unlock_secret: SecretString,
    pub max_failed_attempts: u32,
    pub lockout_seconds: i64,
    pub unlock_ttl_seconds: i64,
    pub render_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing secret is unusable, the database is unreachable, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    // Fail fast: a blank secret cannot sign anything.
    let signer = UnlockSigner::new(args.unlock_secret)
        .context("Invalid unlock signing secret")?
        .with_ttl_seconds(args.unlock_ttl_seconds);

    let policy = GatePolicy::new()
        .with_max_failed_attempts(args.max_failed_attempts)
        .with_lockout_seconds(args.lockout_seconds);

    let renderer = HttpReportRenderer::new(&args.render_url)
        .with_context(|| format!("Invalid render service URL: {}", args.render_url))?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let state = ShareState::new(
        Arc::new(PgShareStore::new(pool)),
        policy,
        signer,
        Arc::new(renderer),
    );

    let result = api::new(args.port, Arc::new(state)).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("render_url", args.render_url.clone()),
        ("max_failed_attempts", args.max_failed_attempts.to_string()),
        ("lockout_seconds", args.lockout_seconds.to_string()),
        ("unlock_ttl_seconds", args.unlock_ttl_seconds.to_string()),
    ];
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
