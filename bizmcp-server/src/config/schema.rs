//! Configuration schema structs

use bizmcp_utils::LogOutput;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub downstream: DownstreamConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

/// Listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP transport binds to (default: 0.0.0.0:3000)
    pub listen_addr: String,
    /// Largest accepted `POST /mcp` body in bytes (default: 1 MiB)
    pub max_body_bytes: usize,
    /// How long shutdown waits for in-flight connections (default: 5)
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            max_body_bytes: 1024 * 1024,
            shutdown_grace_secs: 5,
        }
    }
}

/// Business API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Base URL every tool endpoint is resolved against
    pub base_url: String,
    /// Per-request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: 30,
        }
    }
}

/// Per-peer session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Maximum invocation records kept per peer (default: 100)
    pub history_capacity: usize,
    /// Reject tools/list and tools/call before `initialize` (default: true)
    pub require_initialize: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            require_initialize: true,
        }
    }
}

/// Log output settings; `BIZMCP_LOG` overrides `filter`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub output: LogOutput,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.server.max_body_bytes, 1_048_576);
        assert_eq!(config.server.shutdown_grace_secs, 5);
        assert_eq!(config.downstream.base_url, "http://localhost:8000");
        assert_eq!(config.downstream.timeout_secs, 30);
        assert_eq!(config.sessions.history_capacity, 100);
        assert!(config.sessions.require_initialize);
        assert_eq!(config.logging.output, LogOutput::Stderr);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [downstream]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.downstream.timeout_secs, 10);
        assert_eq!(config.downstream.base_url, "http://localhost:8000");
        assert_eq!(config.server.listen_addr, "0.0.0.0:3000");
    }

    #[test]
    fn test_logging_output_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            [logging]
            output = "both"
            filter = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.output, LogOutput::Both);
        assert_eq!(config.logging.filter, "debug");
    }
}
