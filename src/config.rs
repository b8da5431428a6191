//! Runtime and server configuration.
//!
//! Every field has a default, so an empty (or missing) TOML file is valid.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerfLogConfig {
    /// Quiet window before an idle correlation id is cleared (ms)
    pub quiet_window_ms: u64,

    /// Whether `begin` adopts its correlation id as the current one
    pub adopt_correlation: bool,

    /// Log a warning when a pending begin is overwritten
    pub warn_on_overwrite: bool,

    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,

    /// Cadence of the SSE snapshot stream (ms)
    pub stream_interval_ms: u64,
}

impl Default for PerfLogConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 300,
            adopt_correlation: true,
            warn_on_overwrite: true,
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            stream_interval_ms: 500,
        }
    }
}

impl PerfLogConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_window_ms == 0 {
            return Err(ConfigError::Invalid("quiet_window_ms must be > 0".into()));
        }
        if self.server.stream_interval_ms < 50 {
            return Err(ConfigError::Invalid(
                "server.stream_interval_ms must be at least 50".into(),
            ));
        }
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.bind_address '{}' is not a socket address",
                self.server.bind_address
            )));
        }
        Ok(())
    }
}
