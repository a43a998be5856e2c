//! Records and request/response payloads for shared report access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Access-control record for a shared report or verification object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedResource {
    pub id: Uuid,
    pub share_token: String,
    /// Identifier of the underlying report passed to the renderer.
    pub object_id: String,
    pub is_password_protected: bool,
    pub password_salt: Option<String>,
    pub password_hash: Option<String>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ProtectedResource {
    #[must_use]
    pub fn attempt_state(&self) -> AttemptState {
        AttemptState {
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
        }
    }

    /// Salt and hash, only when both are present and non-empty.
    #[must_use]
    pub fn password_material(&self) -> Option<(&str, &str)> {
        let salt = self.password_salt.as_deref().filter(|s| !s.is_empty())?;
        let hash = self.password_hash.as_deref().filter(|h| !h.is_empty())?;
        Some((salt, hash))
    }
}

/// The mutable lockout columns of a share, compared and swapped as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl AttemptState {
    #[must_use]
    pub const fn cleared() -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
        }
    }

    /// The lock timestamp if it is strictly after `now`.
    #[must_use]
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.locked_until.filter(|until| *until > now)
    }

    /// State to count from: an elapsed lock window resets the counter.
    #[must_use]
    pub fn baseline(&self, now: DateTime<Utc>) -> Self {
        match self.locked_until {
            Some(until) if until <= now => Self::cleared(),
            _ => *self,
        }
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UnlockResponse {
    pub ok: bool,
    pub unlocked: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub ok: bool,
    pub message: String,
}

/// Returned instead of the report when a password is still required.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPrompt {
    pub ok: bool,
    pub password_required: bool,
    pub unlock_path: String,
    pub message: String,
}
