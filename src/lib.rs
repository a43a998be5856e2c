//! # Sharegate (token-gated shared reports)
//!
//! `sharegate` serves generated reports and verification objects behind an opaque,
//! unguessable share token. A share may additionally be protected by a password.
//!
//! ## Access Flow
//!
//! 1. The share token is resolved to the most recent non-deleted record. Unknown and
//!    deleted tokens both answer a generic `404 Not Found`.
//! 2. Unprotected shares are rendered immediately.
//! 3. Protected shares require an unlock cookie. Without one the viewer gets the data
//!    needed to show a password prompt.
//! 4. `POST /share/verification/{token}/unlock` checks the password against the stored
//!    salted digest. Repeated failures lock the share for a cooldown window.
//! 5. A correct password mints an HMAC-signed cookie bound to the token and to the
//!    current password hash, scoped to `Path=/share/verification/{token}`.
//!
//! ## Lockout
//!
//! Failed attempt counters live in `PostgreSQL` and are updated with compare-and-set,
//! so concurrent wrong guesses cannot slip past the threshold. A lockout is only ever
//! cleared by a verified-correct password or by the lock window expiring.
//!
//! ## Credential Rotation
//!
//! The unlock signature covers the current password hash. Rotating the password
//! invalidates every previously issued cookie without a revocation list.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
