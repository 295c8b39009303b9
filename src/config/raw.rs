//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults, so an
//! empty or missing file resolves to a working local-development config.

use serde::Deserialize;

#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub mesh: RawMesh,
    #[serde(default)]
    pub bus: RawBus,
    #[serde(default)]
    pub content: RawContent,
}

#[derive(Deserialize)]
pub(super) struct RawMesh {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawMesh {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawBus {
    /// `"nats"` or `"local"`.
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_buffer")]
    pub inbound_buffer: usize,
    #[serde(default = "default_buffer")]
    pub outbound_buffer: usize,
}

impl Default for RawBus {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            inbound_buffer: default_buffer(),
            outbound_buffer: default_buffer(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawContent {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_compose_url")]
    pub compose_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawContent {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            compose_url: default_compose_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_transport() -> String { "nats".to_string() }
fn default_buffer() -> usize { 256 }
fn default_provider() -> String { "http".to_string() }
pub(super) fn default_compose_url() -> String { "http://localhost:8787".to_string() }
fn default_timeout_seconds() -> u64 { 30 }
