//! Password verification and brute-force lockout for protected shares.
//!
//! Flow Overview:
//! 1) Unprotected shares are admitted without looking at the submission.
//! 2) An active lock rejects every submission before any digest is computed.
//! 3) The salted digest is compared in constant time.
//! 4) Success clears the counters; failure increments them and trips the lock at the
//!    configured threshold.
//! 5) Counter writes are compare-and-set. A lost race re-reads the record and runs the
//!    state machine again, so concurrent wrong guesses are never dropped.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use super::storage::ShareStore;
use super::types::{AttemptState, ProtectedResource};

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;
const MAX_WRITE_RETRIES: usize = 8;
const SALT_BYTES: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GatePolicy {
    max_failed_attempts: u32,
    lockout: TimeDelta,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout: TimeDelta::seconds(DEFAULT_LOCKOUT_SECONDS),
        }
    }
}

impl GatePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout = TimeDelta::try_seconds(seconds.max(0))
            .unwrap_or_else(|| TimeDelta::seconds(DEFAULT_LOCKOUT_SECONDS));
        self
    }

    #[must_use]
    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    #[must_use]
    pub fn lockout(&self) -> TimeDelta {
        self.lockout
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidPassword,
    /// Protected share without salt or hash. Never reported as a wrong password.
    ServerMisconfigured,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(RejectReason),
    RateLimited { retry_at: DateTime<Utc> },
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("share store failure: {0}")]
    Store(#[from] anyhow::Error),
    #[error("shared report disappeared during verification")]
    Vanished,
    #[error("attempt counters kept changing; gave up after {} tries", MAX_WRITE_RETRIES)]
    Contention,
}

/// Salted digest stored for protected shares: lowercase hex `SHA-256(salt ':' password)`.
#[must_use]
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Random salt for a new or rotated share password.
///
/// # Errors
/// Returns an error if the OS random number generator fails.
pub fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate password salt")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn digest_matches(salt: &str, submitted: &str, expected: &str) -> bool {
    let computed = hash_password(salt, submitted);
    let expected = expected.trim().to_ascii_lowercase();
    computed.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub struct PasswordGate {
    store: Arc<dyn ShareStore>,
    policy: GatePolicy,
}

impl PasswordGate {
    #[must_use]
    pub fn new(store: Arc<dyn ShareStore>, policy: GatePolicy) -> Self {
        Self { store, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Verify a submitted password against a resolved share.
    ///
    /// # Errors
    /// Returns an error if the store fails or the counters cannot be updated.
    pub async fn verify(
        &self,
        resource: &ProtectedResource,
        submitted: &str,
    ) -> Result<Verdict, GateError> {
        self.verify_at(resource, submitted, Utc::now()).await
    }

    /// Same as [`PasswordGate::verify`] with an explicit verification instant.
    ///
    /// # Errors
    /// Returns an error if the store fails or the counters cannot be updated.
    pub async fn verify_at(
        &self,
        resource: &ProtectedResource,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<Verdict, GateError> {
        // Stored timestamps have microsecond precision.
        let now = now.trunc_subsecs(6);
        let mut current = resource.clone();

        for attempt in 0..MAX_WRITE_RETRIES {
            if attempt > 0 {
                current = self
                    .store
                    .find_by_id(resource.id)
                    .await?
                    .ok_or(GateError::Vanished)?;
            }

            if !current.is_password_protected {
                return Ok(Verdict::Admit);
            }

            let observed = current.attempt_state();
            if let Some(retry_at) = observed.active_lock(now) {
                debug!(resource_id = %current.id, "share is locked; skipping password check");
                return Ok(Verdict::RateLimited { retry_at });
            }

            let Some((salt, expected)) = current.password_material() else {
                error!(
                    resource_id = %current.id,
                    "password protected share is missing its salt or hash"
                );
                return Ok(Verdict::Reject(RejectReason::ServerMisconfigured));
            };

            let (next, verdict) = if digest_matches(salt, submitted, expected) {
                (AttemptState::cleared(), Verdict::Admit)
            } else {
                self.failure_transition(observed.baseline(now), now)
            };

            if next == observed {
                return Ok(verdict);
            }

            if self
                .store
                .compare_and_set_attempts(current.id, observed, next)
                .await?
            {
                log_transition(&current, &next, &verdict);
                return Ok(verdict);
            }

            debug!(
                resource_id = %current.id,
                attempt,
                "attempt counters changed concurrently, re-reading"
            );
        }

        warn!(resource_id = %resource.id, "gave up updating share attempt counters");
        Err(GateError::Contention)
    }

    fn failure_transition(
        &self,
        baseline: AttemptState,
        now: DateTime<Utc>,
    ) -> (AttemptState, Verdict) {
        let failed_attempts = baseline.failed_attempts.saturating_add(1);
        if failed_attempts >= self.policy.max_failed_attempts {
            let retry_at = now
                .checked_add_signed(self.policy.lockout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            (
                AttemptState {
                    failed_attempts,
                    locked_until: Some(retry_at),
                },
                Verdict::RateLimited { retry_at },
            )
        } else {
            (
                AttemptState {
                    failed_attempts,
                    locked_until: None,
                },
                Verdict::Reject(RejectReason::InvalidPassword),
            )
        }
    }
}

fn log_transition(resource: &ProtectedResource, next: &AttemptState, verdict: &Verdict) {
    match verdict {
        Verdict::Admit => {
            info!(resource_id = %resource.id, "share unlocked, attempt counters cleared");
        }
        Verdict::RateLimited { retry_at } => warn!(
            resource_id = %resource.id,
            failed_attempts = next.failed_attempts,
            locked_until = %retry_at,
            "share locked after repeated failed passwords"
        ),
        Verdict::Reject(_) => warn!(
            resource_id = %resource.id,
            failed_attempts = next.failed_attempts,
            "invalid share password"
        ),
    }
}
