//! Gateway configuration with validation.
//!
//! Loaded from an optional TOML file, then overridden from the environment.

use relay_core::domain::config::humantime_serde;
use relay_core::DispatchConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration (tool frontend, status, metrics)
    pub http: HttpConfig,
    /// Executor WebSocket configuration
    pub websocket: WebSocketConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Correlation and dispatch settings
    pub dispatch: DispatchConfig,
}

impl GatewayConfig {
    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `RELAY_HTTP_HOST` / `RELAY_HTTP_PORT` style overrides.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RELAY_HTTP_HOST") {
            self.http.host = host
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RELAY_HTTP_HOST: {}", host)))?;
        }
        if let Some(port) = lookup("RELAY_HTTP_PORT") {
            self.http.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("RELAY_HTTP_PORT: {}", port)))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.websocket.outbound_buffer == 0 {
            return Err(ConfigError::InvalidLimit(
                "outbound_buffer cannot be 0".into(),
            ));
        }

        if self.websocket.max_message_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_message_size cannot be 0".into(),
            ));
        }

        if self.http.max_batch_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_batch_size cannot be 0".into(),
            ));
        }

        self.dispatch
            .validate()
            .map_err(|e| ConfigError::Dispatch(e.to_string()))
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3000)
    pub port: u16,
    /// Max requests in one JSON-RPC batch
    pub max_batch_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            max_batch_size: 32,
        }
    }
}

/// Executor WebSocket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Frames queued per executor before broadcasts skip it
    pub outbound_buffer: usize,
    /// Inbound frames larger than this are dropped
    pub max_message_size: usize,
    /// Interval between protocol pings to each executor
    #[serde(with = "humantime_serde")]
    pub ping_interval: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            max_message_size: 16 * 1024 * 1024,
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config: {0}")]
    Io(String),
    /// TOML did not parse into the config shape
    #[error("cannot parse config: {0}")]
    Parse(String),
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Dispatch section rejected
    #[error("invalid dispatch settings: {0}")]
    Dispatch(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{BroadcastMode, CommandKind};

    #[test]
    fn test_default_config_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.port, 3000);
    }

    #[test]
    fn test_toml_sections_are_optional() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [http]
            port = 4000

            [dispatch]
            broadcast = "latest"

            [dispatch.timeouts]
            navigate = "45s"
            show_alert = "500ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 4000);
        assert_eq!(config.websocket.outbound_buffer, 256);
        assert_eq!(config.dispatch.broadcast, BroadcastMode::Latest);
        assert_eq!(
            config.dispatch.timeout_for(CommandKind::Navigate),
            Duration::from_secs(45)
        );
        assert_eq!(
            config.dispatch.timeout_for(CommandKind::ShowAlert),
            Duration::from_millis(500)
        );
        // Untouched kinds keep their defaults
        assert_eq!(
            config.dispatch.timeout_for(CommandKind::CreatePost),
            Duration::from_secs(20)
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|key| match key {
                "RELAY_HTTP_HOST" => Some("0.0.0.0".into()),
                "RELAY_HTTP_PORT" => Some("8123".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.http_addr().to_string(), "0.0.0.0:8123");

        let bad = config.apply_overrides(|key| (key == "RELAY_HTTP_PORT").then(|| "http".into()));
        assert!(matches!(bad, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_zero_buffer() {
        let mut config = GatewayConfig::default();
        config.websocket.outbound_buffer = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_validation_covers_dispatch_section() {
        let config = GatewayConfig::from_toml_str(
            r#"
            [dispatch]
            max_request_age = "10s"
            "#,
        )
        .unwrap();
        // Default 30s execute timeout exceeds the 10s ceiling
        assert!(matches!(config.validate(), Err(ConfigError::Dispatch(_))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            GatewayConfig::from_toml_str("[http\nport = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
