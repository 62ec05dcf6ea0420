//! Server configuration.
//!
//! # Responsibilities
//! - Define the serde schema for file-driven server setup
//! - Load TOML from disk and validate it before use
//! - Carry the timeout defaults applied when embedding code sets nothing
//!
//! # Design Decisions
//! - Semantic validation runs after parsing and reports all problems,
//!   not just the first
//! - Timeouts are plain seconds in the schema and become `Duration` at
//!   the server boundary, keeping config files free of unit suffixes

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Root configuration for an embedded server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name used in lifecycle logs.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub listen: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "httpserve".to_string(),
            listen: "0.0.0.0:8080".to_string(),
            tls: None,
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// TLS material for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request body read timeout in seconds.
    pub read_secs: u64,

    /// Response write (handler dispatch) timeout in seconds.
    pub write_secs: u64,

    /// Idle keep-alive connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 15,
            write_secs: 15,
            idle_secs: 60,
        }
    }
}

impl TimeoutConfig {
    /// Body read timeout as a `Duration`.
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    /// Dispatch timeout as a `Duration`.
    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    /// Idle timeout as a `Duration`.
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Semantic validation (serde handles syntactic). Collects every problem.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.listen.parse::<SocketAddr>().is_err() {
        errors.push(format!("listen address '{}' is not host:port", config.listen));
    }
    if config.timeouts.read_secs == 0 {
        errors.push("timeouts.read_secs must be greater than 0".to_string());
    }
    if config.timeouts.write_secs == 0 {
        errors.push("timeouts.write_secs must be greater than 0".to_string());
    }
    if config.timeouts.idle_secs == 0 {
        errors.push("timeouts.idle_secs must be greater than 0".to_string());
    }
    if let Some(tls) = &config.tls {
        if !Path::new(&tls.cert_path).exists() {
            errors.push(format!("TLS certificate not found: {}", tls.cert_path));
        }
        if !Path::new(&tls.key_path).exists() {
            errors.push(format!("TLS key not found: {}", tls.key_path));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
