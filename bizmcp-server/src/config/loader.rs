//! Configuration loader

use std::net::SocketAddr;
use std::path::Path;

use bizmcp_utils::{config_file, BridgeError, Result};
use reqwest::Url;

use super::AppConfig;

/// Smallest accepted `server.max_body_bytes`
const MIN_BODY_BYTES: usize = 1024;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(BridgeError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| BridgeError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.server.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(BridgeError::config(format!(
                "listen_addr '{}' is not a valid socket address",
                config.server.listen_addr
            )));
        }

        if config.server.max_body_bytes < MIN_BODY_BYTES {
            return Err(BridgeError::config(format!(
                "max_body_bytes must be at least {}",
                MIN_BODY_BYTES
            )));
        }

        match Url::parse(&config.downstream.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => {
                return Err(BridgeError::config(format!(
                    "downstream base_url '{}' must be an absolute http(s) URL",
                    config.downstream.base_url
                )));
            }
        }

        if config.downstream.timeout_secs == 0 {
            return Err(BridgeError::config("downstream timeout_secs must be at least 1"));
        }

        if config.sessions.history_capacity == 0 {
            return Err(BridgeError::config("history_capacity must be at least 1"));
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate(path: Option<&Path>) -> Result<AppConfig> {
        let config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load()?,
        };
        Self::validate(&config)?;
        Ok(config)
    }
}
