//! Loading logic: TOML file, env overrides, and bus credentials.

use std::env;
use std::fs;
use std::path::Path;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

pub const ENV_BUS_HOST: &str = "MESH_BUS_HOST";
pub const ENV_BUS_TENANT: &str = "MESH_BUS_TENANT";
pub const ENV_BUS_USERNAME: &str = "MESH_BUS_USERNAME";
pub const ENV_BUS_PASSWORD: &str = "MESH_BUS_PASSWORD";

const ENV_LOG_LEVEL: &str = "MESH_LOG_LEVEL";
const ENV_COMPOSE_URL: &str = "WORKER_API_URL";

/// Load config from the given path, or `config/default.toml` when present,
/// then apply env-var overrides. With neither file, built-in defaults apply.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let log_level_override = env::var(ENV_LOG_LEVEL).ok();
    let compose_url_override = env::var(ENV_COMPOSE_URL).ok();

    if let Some(path) = config_path {
        return load_from(
            Some(Path::new(path)),
            log_level_override.as_deref(),
            compose_url_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    load_from(
        default_path.exists().then_some(default_path),
        log_level_override.as_deref(),
        compose_url_override.as_deref(),
    )
}

/// Internal loader. Accepts an explicit (optional) path and overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: Option<&Path>,
    log_level_override: Option<&str>,
    compose_url_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str::<RawConfig>(&text)
                .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?
        }
        None => RawConfig::default(),
    };

    let transport = match raw.bus.transport.as_str() {
        "nats" => TransportKind::Nats,
        "local" => TransportKind::Local,
        other => {
            return Err(AppError::Config(format!(
                "unknown bus transport {other:?} (expected \"nats\" or \"local\")"
            )));
        }
    };

    if raw.bus.inbound_buffer == 0 || raw.bus.outbound_buffer == 0 {
        return Err(AppError::Config("bus buffers must be greater than zero".into()));
    }
    if raw.content.timeout_seconds == 0 {
        return Err(AppError::Config("content.timeout_seconds must be greater than zero".into()));
    }

    let compose_url = compose_url_override
        .unwrap_or(&raw.content.compose_url)
        .trim_end_matches('/')
        .to_string();

    Ok(Config {
        log_level: log_level_override.unwrap_or(&raw.mesh.log_level).to_string(),
        bus: BusConfig {
            transport,
            inbound_buffer: raw.bus.inbound_buffer,
            outbound_buffer: raw.bus.outbound_buffer,
        },
        content: ContentConfig {
            provider: raw.content.provider,
            compose_url,
            timeout_seconds: raw.content.timeout_seconds,
        },
    })
}

/// Read bus credentials from the process environment.
pub fn bus_credentials() -> Result<BusCredentials, AppError> {
    bus_credentials_from(|name| env::var(name).ok())
}

/// Credential lookup through an arbitrary source. Every variable is
/// required; a missing or blank one is fatal.
pub fn bus_credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<BusCredentials, AppError> {
    let required = |name: &str| {
        lookup(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Config(format!("{name} env required")))
    };

    let credentials = BusCredentials {
        host: required(ENV_BUS_HOST)?,
        tenant: required(ENV_BUS_TENANT)?,
        username: required(ENV_BUS_USERNAME)?,
        password: required(ENV_BUS_PASSWORD)?,
    };

    if credentials
        .tenant
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '*' | '>' | '/'))
    {
        return Err(AppError::Config(format!(
            "{ENV_BUS_TENANT} must not contain whitespace, '/', '*' or '>'"
        )));
    }

    Ok(credentials)
}
