//! Client configuration.
//!
//! Configuration can be loaded from:
//! - A TOML file given on the command line
//! - `tether.toml` in one of the default locations
//! - Environment variables (TETHER_URL)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tether_core::ClientOptions;
use tether_protocol::{JsonSerializer, MsgPackSerializer};
use tether_transport::WebSocketConfig;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Socket URL to connect to.
    #[serde(default = "default_url")]
    pub url: String,

    /// Extra query parameters sent on connect (e.g. an auth token).
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Topics joined after every connect.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Reconnect policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Wire serializer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    /// JSON text frames.
    Json,
    /// MessagePack binary frames.
    Msgpack,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Serializer for frames on the wire.
    #[serde(default = "default_serializer")]
    pub serializer: SerializerKind,

    /// Websocket ping interval in milliseconds; 0 disables keepalive.
    #[serde(default = "default_keepalive")]
    pub keepalive_ms: u64,

    /// Maximum inbound message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Reconnect after losing the connection; otherwise exit.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay before reconnecting or rejoining, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub delay_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_url() -> String {
    std::env::var("TETHER_URL")
        .unwrap_or_else(|_| "ws://127.0.0.1:4000/socket/websocket".to_string())
}

fn default_true() -> bool {
    true
}

fn default_serializer() -> SerializerKind {
    SerializerKind::Json
}

fn default_keepalive() -> u64 {
    30_000 // 30 seconds
}

fn default_max_message_size() -> usize {
    1024 * 1024 // 1 MB
}

fn default_reconnect_delay() -> u64 {
    5_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            params: BTreeMap::new(),
            topics: Vec::new(),
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            serializer: default_serializer(),
            keepalive_ms: default_keepalive(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: default_reconnect_delay(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the default paths, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tether.toml",
            "/etc/tether/tether.toml",
            "~/.config/tether/tether.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// WebSocket transport settings.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig {
            keepalive: (self.transport.keepalive_ms > 0)
                .then(|| Duration::from_millis(self.transport.keepalive_ms)),
            max_message_size: self.transport.max_message_size,
        }
    }

    /// Client options for the configured serializer.
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        let options = ClientOptions::default();
        match self.transport.serializer {
            SerializerKind::Json => options.with_serializer(JsonSerializer),
            SerializerKind::Msgpack => options.with_serializer(MsgPackSerializer),
        }
    }

    /// Delay before reconnecting or rejoining.
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.topics.is_empty());
        assert!(config.reconnect.enabled);
        assert!(!config.metrics.enabled);
        assert_eq!(config.transport.serializer, SerializerKind::Json);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            url = "wss://chat.example.com/socket/websocket"
            topics = ["room:lobby", "room:42"]

            [params]
            token = "secret"

            [transport]
            serializer = "msgpack"
            keepalive_ms = 0

            [reconnect]
            delay_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.url, "wss://chat.example.com/socket/websocket");
        assert_eq!(config.topics, vec!["room:lobby", "room:42"]);
        assert_eq!(config.params["token"], "secret");
        assert_eq!(config.transport.serializer, SerializerKind::Msgpack);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(250));
        assert_eq!(config.websocket_config().keepalive, None);
        assert_eq!(config.client_options().serializer.name(), "msgpack");
    }

    #[test]
    fn test_websocket_config_keepalive() {
        let config = Config::default();
        let ws = config.websocket_config();
        assert_eq!(ws.keepalive, Some(Duration::from_secs(30)));
        assert_eq!(ws.max_message_size, 1024 * 1024);
    }
}
