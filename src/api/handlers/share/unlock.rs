//! `POST /share/verification/{token}/unlock`

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderValue, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::error::ShareError;
use super::gate::{RejectReason, Verdict};
use super::resolver;
use super::state::ShareState;
use super::types::{ErrorResponse, UnlockRequest, UnlockResponse};

#[utoipa::path(
    post,
    path = "/share/verification/{token}/unlock",
    params(("token" = String, Path, description = "Opaque share token")),
    request_body = UnlockRequest,
    responses(
        (status = 200, description = "Password accepted, unlock cookie set", body = UnlockResponse),
        (status = 400, description = "Missing token or password", body = ErrorResponse),
        (status = 401, description = "Invalid password", body = ErrorResponse),
        (status = 404, description = "No active protected share for this token", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse),
        (status = 500, description = "Share is misconfigured", body = ErrorResponse)
    ),
    tag = "share"
)]
#[instrument(skip_all)]
pub async fn unlock(
    Path(token): Path<String>,
    state: Extension<Arc<ShareState>>,
    payload: Option<Json<UnlockRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request);
    match unlock_share(&state, &token, request).await {
        Ok(cookie) => (
            StatusCode::OK,
            [(SET_COOKIE, cookie)],
            Json(UnlockResponse {
                ok: true,
                unlocked: true,
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn unlock_share(
    state: &ShareState,
    token: &str,
    request: Option<UnlockRequest>,
) -> Result<HeaderValue, ShareError> {
    if token.trim().is_empty() {
        return Err(ShareError::BadRequest("Missing share token"));
    }
    let password = request
        .map(|request| request.password)
        .filter(|password| !password.trim().is_empty())
        .ok_or(ShareError::BadRequest("Missing password"))?;

    let resource = resolver::resolve(state.store(), token).await?;
    if !resource.is_password_protected {
        return Err(ShareError::NotFound);
    }

    match state.gate().verify(&resource, &password).await {
        Ok(Verdict::Admit) => {}
        Ok(Verdict::Reject(RejectReason::InvalidPassword)) => return Err(ShareError::Unauthorized),
        Ok(Verdict::Reject(RejectReason::ServerMisconfigured)) => {
            return Err(ShareError::ServerMisconfigured);
        }
        Ok(Verdict::RateLimited { retry_at }) => return Err(ShareError::RateLimited { retry_at }),
        Err(err) => {
            error!(resource_id = %resource.id, "Failed to verify share password: {err}");
            return Err(ShareError::Internal);
        }
    }

    state
        .signer()
        .issue(token, &resource)
        .and_then(|cookie| cookie.to_header_value())
        .map_err(|err| {
            error!(resource_id = %resource.id, "Failed to issue unlock cookie: {err}");
            ShareError::ServerMisconfigured
        })
}
