//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the effective level is resolved.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Directives appended to every filter so broker client internals stay quiet
/// unless explicitly asked for through `RUST_LOG`.
const QUIET_DEPENDENCIES: &[&str] = &["async_nats=warn", "hyper_util=warn", "reqwest=warn"];

/// Initialise the global tracing subscriber, writing to stderr.
///
/// If `prefer_level` is `true` (a CLI `-v` flag was given), `level` wins and
/// `RUST_LOG` is only a fallback for an invalid level. Otherwise `RUST_LOG`
/// wins and `level` is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let filter = build_filter(level, prefer_level, std::env::var("RUST_LOG").ok().as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Resolve the filter from the configured level and an optional `RUST_LOG`
/// value. Split out of [`init`] so precedence is testable without touching
/// the global subscriber.
fn build_filter(level: &str, prefer_level: bool, rust_log: Option<&str>) -> Result<EnvFilter, AppError> {
    let from_env = || rust_log.map(EnvFilter::try_new);

    let mut filter = match (prefer_level, from_env()) {
        (false, Some(Ok(env_filter))) => env_filter,
        (true, env_result) => match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(level_err) => match env_result {
                Some(Ok(env_filter)) => env_filter,
                _ => {
                    return Err(AppError::Logger(format!(
                        "invalid log level '{level}': {level_err}"
                    )));
                }
            },
        },
        (false, _) => EnvFilter::try_new(level)
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?,
    };

    if rust_log.is_none() {
        for directive in QUIET_DEPENDENCIES {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
    }
    Ok(filter)
}
