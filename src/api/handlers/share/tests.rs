use super::credential::{UnlockSigner, cookie_name};
use super::gate::GatePolicy;
use super::memory::{MemoryShareStore, open_resource, protected_resource};
use super::render::{RenderError, RenderedDocument, ReportRenderer};
use super::state::ShareState;
use super::storage::ShareStore;
use super::types::AttemptState;
use crate::api::router;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, RETRY_AFTER, SET_COOKIE},
    },
    response::Response,
};
use chrono::{TimeDelta, Utc};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "shareTokenAAAAAAAAAAAA";
const OTHER_TOKEN: &str = "shareTokenBBBBBBBBBBBB";
const SALT: &str = "pepper-salt";
const PASSWORD: &str = "open sesame";

struct StaticRenderer;

#[async_trait]
impl ReportRenderer for StaticRenderer {
    async fn render(&self, object_id: &str) -> Result<RenderedDocument, RenderError> {
        Ok(RenderedDocument {
            content_type: "application/pdf".to_string(),
            body: format!("%PDF {object_id}").into_bytes(),
        })
    }
}

struct FailingRenderer;

#[async_trait]
impl ReportRenderer for FailingRenderer {
    async fn render(&self, _object_id: &str) -> Result<RenderedDocument, RenderError> {
        Err(RenderError::Status(502))
    }
}

fn signer() -> Result<UnlockSigner> {
    Ok(UnlockSigner::new(SecretString::from(
        "router-test-secret".to_string(),
    ))?)
}

fn app_with(store: Arc<MemoryShareStore>, renderer: Arc<dyn ReportRenderer>) -> Result<Router> {
    let state = ShareState::new(store, GatePolicy::default(), signer()?, renderer);
    Ok(router(Arc::new(state)))
}

fn app(store: Arc<MemoryShareStore>) -> Result<Router> {
    app_with(store, Arc::new(StaticRenderer))
}

fn unlock_request(token: &str, body: Option<Value>) -> Result<Request<Body>> {
    let builder = Request::builder()
        .method("POST")
        .uri(format!("/share/verification/{token}/unlock"));
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    Ok(request)
}

fn view_request(token: &str, cookie: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().uri(format!("/share/verification/{token}"));
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `name=value` pair from the first `Set-Cookie` header.
fn cookie_pair(response: &Response) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .ok_or_else(|| anyhow!("missing Set-Cookie"))?
        .to_str()?;
    header
        .split(';')
        .next()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("empty Set-Cookie"))
}

async fn protected_store() -> Arc<MemoryShareStore> {
    let store = Arc::new(MemoryShareStore::default());
    store
        .insert(protected_resource(TOKEN, SALT, PASSWORD))
        .await;
    store
}

async fn unlock_with(app: &Router, token: &str, password: &str) -> Result<Response> {
    Ok(app
        .clone()
        .oneshot(unlock_request(token, Some(json!({ "password": password })))?)
        .await?)
}

#[tokio::test]
async fn unlock_sets_scoped_cookie() -> Result<()> {
    let app = app(protected_store().await)?;
    let response = unlock_with(&app, TOKEN, PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let header = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();
    assert!(header.starts_with(&format!("{}=", cookie_name(TOKEN))));
    assert!(header.contains(&format!("Path=/share/verification/{TOKEN}")));
    assert!(header.contains("Max-Age=86400"));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("Secure"));
    assert!(header.contains("SameSite=Lax"));

    let body = json_body(response).await?;
    assert_eq!(body, json!({ "ok": true, "unlocked": true }));
    Ok(())
}

#[tokio::test]
async fn unlock_requires_password() -> Result<()> {
    let app = app(protected_store().await)?;

    for body in [Some(json!({})), Some(json!({ "password": "   " })), None] {
        let response = app.clone().oneshot(unlock_request(TOKEN, body)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await?;
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["message"], json!("Missing password"));
    }
    Ok(())
}

#[tokio::test]
async fn unlock_rejects_wrong_password() -> Result<()> {
    let store = protected_store().await;
    let app = app(store.clone())?;
    let response = unlock_with(&app, TOKEN, "wrong").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Invalid password"));
    assert_eq!(store.write_count(), 1);
    Ok(())
}

#[tokio::test]
async fn unlock_unknown_or_open_share_is_not_found() -> Result<()> {
    let store = protected_store().await;
    store.insert(open_resource(OTHER_TOKEN)).await;
    let app = app(store)?;

    let response = unlock_with(&app, "doesNotExist0000000", PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = unlock_with(&app, OTHER_TOKEN, PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn fifth_failure_locks_the_share() -> Result<()> {
    let store = protected_store().await;
    let app = app(store)?;

    for _ in 0..4 {
        let response = unlock_with(&app, TOKEN, "wrong").await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = unlock_with(&app, TOKEN, "wrong").await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or_default();
    assert!((1..=900).contains(&retry_after));
    let body = json_body(response).await?;
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Too many failed attempts. Try again after "));

    // The correct password does not bypass an active lock.
    let response = unlock_with(&app, TOKEN, PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn expired_lock_allows_unlock() -> Result<()> {
    let store = protected_store().await;
    let resource = store
        .find_active_by_token(TOKEN)
        .await?
        .ok_or_else(|| anyhow!("seeded share missing"))?;
    store
        .set_attempts(
            resource.id,
            AttemptState {
                failed_attempts: 5,
                locked_until: Some(Utc::now() - TimeDelta::seconds(1)),
            },
        )
        .await;

    let app = app(store.clone())?;
    let response = unlock_with(&app, TOKEN, PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let after = store
        .get(resource.id)
        .await
        .ok_or_else(|| anyhow!("share missing"))?;
    assert_eq!(after.attempt_state(), AttemptState::cleared());
    Ok(())
}

#[tokio::test]
async fn misconfigured_share_is_server_error() -> Result<()> {
    let store = Arc::new(MemoryShareStore::default());
    let mut resource = protected_resource(TOKEN, SALT, PASSWORD);
    resource.password_hash = None;
    store.insert(resource).await;

    let app = app(store)?;
    let response = unlock_with(&app, TOKEN, PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    Ok(())
}

#[tokio::test]
async fn view_unknown_token_is_not_found() -> Result<()> {
    let app = app(protected_store().await)?;
    let response = app.oneshot(view_request("doesNotExist0000000", None)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn view_open_share_renders() -> Result<()> {
    let store = Arc::new(MemoryShareStore::default());
    store.insert(open_resource(OTHER_TOKEN)).await;
    let app = app(store)?;

    let response = app.oneshot(view_request(OTHER_TOKEN, None)?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], format!("%PDF report-{OTHER_TOKEN}").as_bytes());
    Ok(())
}

#[tokio::test]
async fn view_protected_share_prompts_for_password() -> Result<()> {
    let app = app(protected_store().await)?;
    let response = app.oneshot(view_request(TOKEN, None)?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await?;
    assert_eq!(body["passwordRequired"], json!(true));
    assert_eq!(
        body["unlockPath"],
        json!(format!("/share/verification/{TOKEN}/unlock"))
    );
    Ok(())
}

#[tokio::test]
async fn view_with_unlock_cookie_renders() -> Result<()> {
    let app = app(protected_store().await)?;
    let unlocked = unlock_with(&app, TOKEN, PASSWORD).await?;
    let cookie = cookie_pair(&unlocked)?;

    let response = app.oneshot(view_request(TOKEN, Some(&cookie))?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cookie_does_not_unlock_other_share() -> Result<()> {
    let store = protected_store().await;
    store
        .insert(protected_resource(OTHER_TOKEN, SALT, PASSWORD))
        .await;
    let app = app(store)?;

    let unlocked = unlock_with(&app, TOKEN, PASSWORD).await?;
    let cookie = cookie_pair(&unlocked)?;
    let value = cookie.split_once('=').map(|(_, v)| v).unwrap_or_default();

    // Same signature presented under the other share's cookie name.
    let forged = format!("{}={value}", cookie_name(OTHER_TOKEN));
    let response = app.oneshot(view_request(OTHER_TOKEN, Some(&forged))?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn password_rotation_revokes_cookie() -> Result<()> {
    let store = protected_store().await;
    let app = app(store.clone())?;
    let unlocked = unlock_with(&app, TOKEN, PASSWORD).await?;
    let cookie = cookie_pair(&unlocked)?;

    let resource = store
        .find_active_by_token(TOKEN)
        .await?
        .ok_or_else(|| anyhow!("seeded share missing"))?;
    store.rotate_password(resource.id, SALT, "new secret").await;

    let response = app.oneshot(view_request(TOKEN, Some(&cookie))?).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn render_failure_looks_like_not_found() -> Result<()> {
    let store = Arc::new(MemoryShareStore::default());
    store.insert(open_resource(OTHER_TOKEN)).await;
    let app = app_with(store, Arc::new(FailingRenderer))?;

    let response = app.oneshot(view_request(OTHER_TOKEN, None)?).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await?;
    assert_eq!(body["message"], json!("Shared report not found"));
    Ok(())
}

#[tokio::test]
async fn health_reports_store_state() -> Result<()> {
    let app = app(protected_store().await)?;
    let request = Request::builder().uri("/health").body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let body = json_body(response).await?;
    assert_eq!(body["database"], json!("ok"));
    Ok(())
}
