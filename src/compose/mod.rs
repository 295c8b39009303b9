//! Compose provider abstraction: the external content-generation call.
//!
//! `ComposeProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely
//! into spawned tasks.

pub mod providers;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::bus::event::ContentKind;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("unknown compose provider: {0}")]
    UnknownProvider(String),
    #[error("compose request failed: {0}")]
    Request(String),
    #[error("compose service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed compose response: {0}")]
    Malformed(String),
    #[error("compose call timed out after {0:?}")]
    TimedOut(Duration),
}

// ── Request / result ──────────────────────────────────────────────────────────

/// One compose call. Exists only for the duration of the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeRequest {
    pub child_id: String,
    pub kind: ContentKind,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposeResult {
    pub url: String,
    pub model: String,
    /// Stored asset id, when the provider persists the result.
    pub asset_id: Option<String>,
}

// ── Provider enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ComposeProvider {
    Http(providers::http::HttpComposeClient),
    Placeholder(providers::placeholder::PlaceholderProvider),
}

impl ComposeProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ComposeProvider::Http(_) => "http",
            ComposeProvider::Placeholder(_) => "placeholder",
        }
    }

    pub async fn compose(&self, request: &ComposeRequest) -> Result<ComposeResult, ComposeError> {
        match self {
            ComposeProvider::Http(p) => p.compose(request).await,
            ComposeProvider::Placeholder(p) => p.compose(request).await,
        }
    }
}
