//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API location, the token storage backend and the last email
//! used to log in.
//!
//! Configuration is stored at `~/.config/medvault/config.json`. Environment
//! variables override the file (see [`Config::apply_env`]).

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Application name used for config/data directory paths
const APP_NAME: &str = "medvault";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Port the backend listens on when the client is reached through a
/// non-local host and no explicit API URL is configured.
pub const ALTERNATE_API_PORT: u16 = 8081;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MEDVAULT_API_URL";
pub const ENV_ORIGIN: &str = "MEDVAULT_ORIGIN";
pub const ENV_TOKEN_BACKEND: &str = "MEDVAULT_TOKEN_BACKEND";

/// Where the session token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenBackend::File),
            "keyring" => Ok(TokenBackend::Keyring),
            "memory" => Ok(TokenBackend::Memory),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit API origin. Takes precedence over everything else.
    pub api_url: Option<String>,
    /// The origin the client is considered to be served from,
    /// e.g. `http://10.0.0.5:5173`.
    pub origin: Option<String>,
    pub token_backend: TokenBackend,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            origin: None,
            token_backend: TokenBackend::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `MEDVAULT_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(origin) = non_empty_env(ENV_ORIGIN) {
            self.origin = Some(origin);
        }
        if let Some(backend) = non_empty_env(ENV_TOKEN_BACKEND) {
            match backend.parse() {
                Ok(b) => self.token_backend = b,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_TOKEN_BACKEND),
            }
        }
    }

    /// The base every relative API path is appended to.
    pub fn base_url(&self) -> String {
        resolve_base_url(self.api_url.as_deref(), self.origin.as_deref())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted token and log files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the API base URL.
///
/// An explicit API URL wins. Otherwise, when the client is served from a
/// host other than `localhost`/`127.0.0.1`, the backend is assumed to run on
/// that host at [`ALTERNATE_API_PORT`]. Otherwise the base is empty and
/// requests are same-origin relative.
pub fn resolve_base_url(api_url: Option<&str>, origin: Option<&str>) -> String {
    if let Some(url) = api_url.filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    let host = origin
        .and_then(|o| Url::parse(o).ok())
        .and_then(|u| u.host_str().map(str::to_string));

    match host {
        Some(host) if host != "localhost" && host != "127.0.0.1" => {
            format!("http://{}:{}", host, ALTERNATE_API_PORT)
        }
        _ => String::new(),
    }
}
