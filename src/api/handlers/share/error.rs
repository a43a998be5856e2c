//! HTTP-facing error taxonomy for share access.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

use super::types::ErrorResponse;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    #[error("{0}")]
    BadRequest(&'static str),
    /// Unknown and deleted tokens are deliberately indistinguishable.
    #[error("Shared report not found")]
    NotFound,
    #[error("Invalid password")]
    Unauthorized,
    #[error("Too many failed attempts. Try again after {} UTC.", .retry_at.format("%Y-%m-%d %H:%M:%S"))]
    RateLimited { retry_at: DateTime<Utc> },
    #[error("Shared report is not available right now")]
    ServerMisconfigured,
    #[error("Internal server error")]
    Internal,
}

impl ShareError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ServerMisconfigured | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whole seconds until `retry_at`, never less than one.
fn retry_after_seconds(retry_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = retry_at.signed_duration_since(now);
    let seconds = remaining.num_seconds();
    let rounded_up = if remaining.subsec_nanos() > 0 {
        seconds + 1
    } else {
        seconds
    };
    rounded_up.max(1)
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            ok: false,
            message: self.to_string(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if let Self::RateLimited { retry_at } = self {
            let seconds = retry_after_seconds(retry_at, Utc::now());
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
