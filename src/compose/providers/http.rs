//! HTTP compose client (`POST /v1/content/compose`).
//!
//! Talks to the worker API, which calls the image/video model and stores the
//! resulting asset. Wire types are private to this module.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::compose::{ComposeError, ComposeRequest, ComposeResult};

const COMPOSE_PATH: &str = "/v1/content/compose";

/// Constructed once at startup, then cloned into each compose task;
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct HttpComposeClient {
    client: Client,
    endpoint: String,
}

impl HttpComposeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ComposeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ComposeError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{COMPOSE_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn compose(&self, request: &ComposeRequest) -> Result<ComposeResult, ComposeError> {
        debug!(
            endpoint = %self.endpoint,
            child_id = %request.child_id,
            kind = request.kind.as_str(),
            prompt_len = request.prompt.len(),
            "sending compose request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = %self.endpoint, error = %e, "compose request failed (transport)");
                ComposeError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        let parsed = response
            .json::<ComposeResponse>()
            .await
            .map_err(|e| ComposeError::Malformed(format!("failed to parse response body: {e}")))?;

        if parsed.url.trim().is_empty() || parsed.model.trim().is_empty() {
            return Err(ComposeError::Malformed("empty url or model in response".into()));
        }

        Ok(ComposeResult {
            url: parsed.url,
            model: parsed.model,
            asset_id: parsed.id,
        })
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ComposeResponse {
    url: String,
    model: String,
    #[serde(default)]
    id: Option<String>,
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ComposeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    error!(%status, %body, "compose request returned HTTP error");
    Err(ComposeError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let a = HttpComposeClient::new("http://localhost:8787", Duration::from_secs(1)).unwrap();
        let b = HttpComposeClient::new("http://localhost:8787/", Duration::from_secs(1)).unwrap();
        assert_eq!(a.endpoint(), "http://localhost:8787/v1/content/compose");
        assert_eq!(b.endpoint(), a.endpoint());
    }

    #[test]
    fn response_id_is_optional() {
        let parsed: ComposeResponse = serde_json::from_str(r#"{"url":"u","model":"m"}"#).unwrap();
        assert!(parsed.id.is_none());
        let parsed: ComposeResponse =
            serde_json::from_str(r#"{"id":"a1","url":"u","model":"m"}"#).unwrap();
        assert_eq!(parsed.id.as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn unreachable_server_is_request_error() {
        // Port 9 (discard) is closed on test hosts.
        let client = HttpComposeClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let request = ComposeRequest {
            child_id: "c2".into(),
            kind: crate::bus::event::ContentKind::Image,
            prompt: "sticker".into(),
        };
        let err = client.compose(&request).await.unwrap_err();
        assert!(matches!(err, ComposeError::Request(_)));
    }
}
