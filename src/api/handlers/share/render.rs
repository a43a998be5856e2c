//! Client for the report-rendering service.

use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;
use tracing::{Instrument, info_span, instrument};
use url::Url;

use crate::APP_USER_AGENT;

const DEFAULT_CONTENT_TYPE: &str = "application/pdf";
const RENDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("renderer answered with status {0}")]
    Status(u16),
    #[error("no document for object {0}")]
    Missing(String),
}

/// Produces the document for a share once access has been granted.
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, object_id: &str) -> Result<RenderedDocument, RenderError>;
}

/// Renders through `POST {base}/v1/render`.
#[derive(Debug, Clone)]
pub struct HttpReportRenderer {
    client: Client,
    endpoint: Url,
}

impl HttpReportRenderer {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(RENDER_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: render_endpoint(base_url)?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn render_endpoint(base_url: &str) -> Result<Url, url::ParseError> {
    let base = format!("{}/", base_url.trim().trim_end_matches('/'));
    Url::parse(&base)?.join("v1/render")
}

#[async_trait]
impl ReportRenderer for HttpReportRenderer {
    #[instrument(skip(self))]
    async fn render(&self, object_id: &str) -> Result<RenderedDocument, RenderError> {
        let span = info_span!("render.request", http.url = %self.endpoint);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "object_id": object_id }))
            .send()
            .instrument(span)
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RenderError::Missing(object_id.to_string()));
        }
        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or_else(|| DEFAULT_CONTENT_TYPE.to_string(), str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RenderedDocument { content_type, body })
    }
}
