//! Compose provider implementations.
//!
//! `build(config)` is the factory, called at startup.

pub mod http;
pub mod placeholder;

use std::time::Duration;

use crate::compose::{ComposeError, ComposeProvider};
use crate::config::ContentConfig;

pub fn build(config: &ContentConfig) -> Result<ComposeProvider, ComposeError> {
    match config.provider.as_str() {
        "http" => Ok(ComposeProvider::Http(http::HttpComposeClient::new(
            &config.compose_url,
            Duration::from_secs(config.timeout_seconds),
        )?)),
        "placeholder" => Ok(ComposeProvider::Placeholder(placeholder::PlaceholderProvider)),
        other => Err(ComposeError::UnknownProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(provider: &str) -> ContentConfig {
        ContentConfig {
            provider: provider.into(),
            compose_url: "http://127.0.0.1:9".into(),
            timeout_seconds: 2,
        }
    }

    #[test]
    fn builds_known_providers() {
        assert_eq!(build(&content("http")).unwrap().name(), "http");
        assert_eq!(build(&content("placeholder")).unwrap().name(), "placeholder");
    }

    #[test]
    fn test_config_uses_placeholder() {
        let provider = build(&crate::config::Config::test_default().content).unwrap();
        assert!(matches!(provider, ComposeProvider::Placeholder(_)));
    }

    #[test]
    fn unknown_provider_errors() {
        let err = build(&content("dall-e-direct")).unwrap_err();
        assert!(matches!(err, ComposeError::UnknownProvider(name) if name == "dall-e-direct"));
    }
}
