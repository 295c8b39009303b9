//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs the mesh consumes.
//! Raw TOML deserialization types live in `raw.rs`.

use std::fmt;

// ── Bus ──────────────────────────────────────────────────────────────────────

/// Which transport the bus session connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// NATS broker at `MESH_BUS_HOST`.
    Nats,
    /// In-process broker; attaches the stdin console.
    Local,
}

/// Bus session configuration (non-secret part).
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub transport: TransportKind,
    /// Depth of the inbound envelope queue.
    pub inbound_buffer: usize,
    /// Depth of the outbound publish queue.
    pub outbound_buffer: usize,
}

/// Transport login. Sourced only from the environment, never TOML.
#[derive(Clone, PartialEq, Eq)]
pub struct BusCredentials {
    pub host: String,
    /// Virtual namespace the mesh's topics live in.
    pub tenant: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BusCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusCredentials")
            .field("host", &self.host)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Content ──────────────────────────────────────────────────────────────────

/// Compose provider configuration for the content agent.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// `"http"` (worker API compose endpoint) or `"placeholder"`.
    pub provider: String,
    /// Base URL of the worker API; `/v1/content/compose` is appended.
    pub compose_url: String,
    /// Upper bound for one compose call, in seconds. Always > 0.
    pub timeout_seconds: u64,
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully-resolved mesh configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub bus: BusConfig,
    pub content: ContentConfig,
}
