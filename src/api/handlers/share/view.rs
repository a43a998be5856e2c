//! `GET /share/verification/{token}`

use axum::{
    Json,
    extract::{Extension, Path},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::credential::{cookie_path, is_request_unlocked};
use super::error::ShareError;
use super::resolver;
use super::state::ShareState;
use super::types::{ErrorResponse, PasswordPrompt};

#[utoipa::path(
    get,
    path = "/share/verification/{token}",
    params(("token" = String, Path, description = "Opaque share token")),
    responses(
        (status = 200, description = "Rendered report", content_type = "application/pdf"),
        (status = 401, description = "Password required", body = PasswordPrompt),
        (status = 404, description = "Shared report not found", body = ErrorResponse)
    ),
    tag = "share"
)]
#[instrument(skip_all)]
pub async fn view(
    Path(token): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<ShareState>>,
) -> Response {
    let resource = match resolver::resolve(state.store(), &token).await {
        Ok(resource) => resource,
        Err(err) => return err.into_response(),
    };

    if resource.is_password_protected
        && !is_request_unlocked(&headers, &token, &resource, state.signer())
    {
        debug!(resource_id = %resource.id, "share requires a password");
        let prompt = PasswordPrompt {
            ok: false,
            password_required: true,
            unlock_path: format!("{}/unlock", cookie_path(&token)),
            message: "Password required".to_string(),
        };
        return (StatusCode::UNAUTHORIZED, Json(prompt)).into_response();
    }

    match state.renderer().render(&resource.object_id).await {
        Ok(document) => {
            let content_type = HeaderValue::from_str(&document.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            let mut response = (StatusCode::OK, document.body).into_response();
            let response_headers = response.headers_mut();
            response_headers.insert(CONTENT_TYPE, content_type);
            response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("private, no-store"));
            response
        }
        Err(err) => {
            // Viewers only ever see "not found" for rendering problems.
            error!(resource_id = %resource.id, "Failed to render shared report: {err}");
            ShareError::NotFound.into_response()
        }
    }
}
