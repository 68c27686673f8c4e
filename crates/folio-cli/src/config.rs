//! CLI configuration: TOML file, then environment, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use folio_api::{API_URL_ENV, ApiConfig};
use folio_content::WORDS_PER_MINUTE;
use folio_editor::UploadPolicy;
use folio_logging::LogConfig;
use serde::{Deserialize, Serialize};

/// Environment variable carrying the admin session token.
pub const API_TOKEN_ENV: &str = "FOLIO_API_TOKEN";

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub words_per_minute: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            words_per_minute: WORDS_PER_MINUTE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api: ApiConfig,
    /// Admin bearer token.
    pub token: Option<String>,
    pub upload: UploadPolicy,
    pub render: RenderSettings,
    pub log: LogConfig,
}

impl CliConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    /// Load `path`, or `folio.toml` in the working directory when present.
    ///
    /// An explicit path must exist; the implicit one may not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Apply `FOLIO_API_URL` and `FOLIO_API_TOKEN` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = set(API_URL_ENV) {
            self.api.base_url = url;
        }
        if let Some(token) = set(API_TOKEN_ENV) {
            self.token = Some(token);
        }
    }

    pub fn apply_flags(&mut self, api_url: Option<String>, token: Option<String>) {
        if let Some(url) = api_url {
            self.api.base_url = url;
        }
        if let Some(token) = token {
            self.token = Some(token);
        }
    }
}
