use std::net::IpAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::core::YearOrdering;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid allowed origin `{0}`")]
    InvalidOrigin(String),
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Reads `OPENAI_API_KEY` and `OPENAI_BASE_URL` through `lookup`; blank
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F, timeout: Duration) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            api_key: non_blank("OPENAI_API_KEY"),
            base_url: non_blank("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout,
        }
    }

    pub fn from_env(timeout: Duration) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), timeout)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub allowed_origin: HeaderValue,
    pub year_ordering: YearOrdering,
}

impl ServerConfig {
    pub fn new(
        bind: IpAddr,
        port: u16,
        allowed_origin: &str,
        year_ordering: YearOrdering,
    ) -> Result<Self, ConfigError> {
        let allowed_origin = HeaderValue::from_str(allowed_origin)
            .map_err(|_| ConfigError::InvalidOrigin(allowed_origin.to_string()))?;

        Ok(Self {
            bind,
            port,
            allowed_origin,
            year_ordering,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::Ipv4Addr;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn provider_config_defaults_base_url() {
        let config = ProviderConfig::from_lookup(
            lookup_from(&[("OPENAI_API_KEY", "sk-test")]),
            Duration::from_secs(5),
        );

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn provider_config_treats_blank_values_as_unset() {
        let config = ProviderConfig::from_lookup(
            lookup_from(&[("OPENAI_API_KEY", "   "), ("OPENAI_BASE_URL", "")]),
            Duration::from_secs(5),
        );

        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn provider_config_honours_base_url_override() {
        let config = ProviderConfig::from_lookup(
            lookup_from(&[("OPENAI_BASE_URL", "http://localhost:11434/v1")]),
            Duration::from_secs(5),
        );

        assert_eq!(config.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn server_config_rejects_unusable_origin() {
        let err = ServerConfig::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            DEFAULT_PORT,
            "http://bad\norigin",
            YearOrdering::default(),
        )
        .expect_err("must reject origin");

        assert!(err.to_string().contains("allowed origin"));
    }

    #[test]
    fn server_config_carries_listener_settings() {
        let config = ServerConfig::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            9000,
            DEFAULT_ALLOWED_ORIGIN,
            YearOrdering::Numeric,
        )
        .expect("valid config");

        assert_eq!(config.port, 9000);
        assert_eq!(config.allowed_origin, DEFAULT_ALLOWED_ORIGIN);
        assert_eq!(config.year_ordering, YearOrdering::Numeric);
    }
}
