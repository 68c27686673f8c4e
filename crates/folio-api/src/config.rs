//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Environment variable overriding the base URL.
pub const API_URL_ENV: &str = "FOLIO_API_URL";

/// Configuration for [`FolioClient`](crate::FolioClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API root, e.g. `https://blog.example.com/api`.
    pub base_url: String,
    /// Per-request timeout.
    #[serde(with = "secs")]
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    /// Defaults with `FOLIO_API_URL` applied when set and non-empty.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(url) = std::env::var(API_URL_ENV).ok().filter(|u| !u.trim().is_empty()) {
            self.base_url = url;
        }
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Full URL for an API path such as `/posts`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("folio/"));
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let config = ApiConfig::default().base_url("https://blog.example.com/api/");
        assert_eq!(config.endpoint("/posts"), "https://blog.example.com/api/posts");
        assert_eq!(
            config.endpoint("images/editor-upload"),
            "https://blog.example.com/api/images/editor-upload"
        );
    }

    #[test]
    fn test_builder() {
        let config = ApiConfig::default()
            .timeout(Duration::from_secs(5))
            .user_agent("test");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ApiConfig =
            serde_json::from_value(serde_json::json!({"timeout": 10})).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
