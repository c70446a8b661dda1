/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load Syn-Fame configuration from TOML with sane defaults
    for API endpoints, retry policy, upload behaviour, and
    output locations.

  Security / Safety Notes:
    The access token is never stored in the config file; only
    the name of the environment variable that carries it.

  Dependencies:
    toml and serde for parsing, dirs for XDG locations.

  Operational Scope:
    Read once at startup by the CLI; the pipeline receives the
    resolved values.

  Revision History:
    2024-11-04 COD  Established configuration loader.
    2025-11-12 COD  Re-scoped for app management endpoints.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Missing file falls back to documented defaults
    - Invalid values are rejected with actionable messages
============================================================*/

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynfameError};
use crate::registry::Availability;

pub const DEFAULT_APPS_API: &str = "https://apps.businesscentral.dynamics.com/v1.0/apps";
pub const DEFAULT_GRAPH_API: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_TOKEN_ENV: &str = "SYNFAME_TOKEN";
pub const DEFAULT_GRAPH_TOKEN_ENV: &str = "SYNFAME_GRAPH_TOKEN";

/// Root configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynfameConfig {
    pub log_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub default_country: Option<String>,
    pub api: ApiConfig,
    pub upload: UploadConfig,
}

/// Endpoints and transport policy for the registry client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub graph_url: String,
    pub tenant_id: Option<String>,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub max_retries: usize,
    pub token_env: String,
    pub graph_token_env: String,
}

/// Defaults for the batch upload driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub availability: Availability,
    pub halt_on_error: bool,
}

impl Default for SynfameConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            report_dir: None,
            default_country: None,
            api: ApiConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_APPS_API.to_string(),
            graph_url: DEFAULT_GRAPH_API.to_string(),
            tenant_id: None,
            timeout: 120,
            max_retries: 3,
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            graph_token_env: DEFAULT_GRAPH_TOKEN_ENV.to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            availability: Availability::Available,
            halt_on_error: false,
        }
    }
}

impl SynfameConfig {
    /// Load from an explicit path, or the default location when absent.
    ///
    /// An explicit path that does not exist is an error; a missing
    /// default file yields defaults.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(SynfameError::Config(format!(
                        "Config file {} does not exist",
                        explicit.display()
                    )));
                }
                Self::load(explicit)
            }
            None => match default_config_path() {
                Some(candidate) if candidate.exists() => Self::load(&candidate),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            SynfameError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| SynfameError::Config(format!("{}: {err}", path.display())))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        let config: SynfameConfig = toml::from_str(raw).map_err(|err| err.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for (key, url) in [("api.base_url", &self.api.base_url), ("api.graph_url", &self.api.graph_url)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(format!("{key} must be an http(s) URL, got `{url}`"));
            }
        }
        if self.api.timeout == 0 {
            return Err("api.timeout must be greater than zero".into());
        }
        if !self.upload.availability.allowed_on_upload() {
            return Err(format!(
                "upload.availability must be Available or Preview, got {}",
                self.upload.availability
            ));
        }
        if let Some(country) = &self.default_country {
            if country.trim().is_empty() {
                return Err("default_country must not be empty".into());
            }
        }
        Ok(())
    }

    /// Directory holding session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| state_dir().join("logs"))
    }

    /// Directory holding upload reports.
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| state_dir().join("reports"))
    }

    /// Read the registry access token from the configured variable.
    pub fn access_token(&self) -> Option<String> {
        read_token(&self.api.token_env)
    }

    /// Read the directory access token, falling back to the registry token.
    pub fn graph_token(&self) -> Option<String> {
        read_token(&self.api.graph_token_env).or_else(|| self.access_token())
    }
}

fn read_token(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("syn-fame").join("config.toml"))
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("syn-fame")
}
