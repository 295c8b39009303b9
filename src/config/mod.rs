//! Configuration loading with env-var overrides.
//!
//! Reads an optional TOML file (`config/default.toml` unless `-f` names one),
//! then applies `MESH_LOG_LEVEL` and `WORKER_API_URL` overrides. Bus
//! credentials come only from `MESH_BUS_*` env vars; see [`bus_credentials`].
//!
//! # Module layout
//!
//! - **types**: resolved structs consumed by the mesh (`Config`, `BusConfig`, …).
//! - **raw**: TOML deserialization shapes with serde defaults; kept private.
//! - **load**: `load`, `load_from`, credential lookup.

mod load;
mod raw;
mod types;

pub use load::{
    ENV_BUS_HOST, ENV_BUS_PASSWORD, ENV_BUS_TENANT, ENV_BUS_USERNAME, bus_credentials,
    bus_credentials_from, load, load_from,
};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for unit tests: local transport, placeholder compose.
    pub fn test_default() -> Self {
        Self {
            log_level: "debug".into(),
            bus: BusConfig {
                transport: TransportKind::Local,
                inbound_buffer: 16,
                outbound_buffer: 16,
            },
            content: ContentConfig {
                provider: "placeholder".into(),
                compose_url: raw::default_compose_url(),
                timeout_seconds: 1,
            },
        }
    }
}
