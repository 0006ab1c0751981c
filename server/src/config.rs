use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ws::actor::Keepalive;

const DEFAULT_CONFIG_PATH: &str = "./relay.toml";

/// WebRTC signaling relay
///
/// Every field is optional so that only flags actually passed on the
/// command line override the lower layers.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "signal-relay-server", version, about = "WebRTC signaling relay")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_logs: Option<bool>,

    /// Seconds between server pings; 0 disables keepalive pings
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_interval_secs: Option<u64>,

    /// Seconds to wait for a pong before closing the connection
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pong_timeout_secs: Option<u64>,

    /// Maximum size of one WebSocket message in bytes
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_bytes: Option<usize>,

    /// Path to TOML config file (default: ./relay.toml)
    #[arg(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,
}

/// Resolved relay configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub max_message_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
            max_message_bytes: 64 * 1024,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (RELAY_*) < CLI args
    pub fn load_from(cli: &Cli) -> Result<Self, figment::Error> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("RELAY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn keepalive(&self) -> Keepalive {
        Keepalive {
            ping_interval: (self.ping_interval_secs > 0)
                .then(|| Duration::from_secs(self.ping_interval_secs)),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Signaling relay configuration
# Place this file at ./relay.toml or specify with --config <path>
# All settings can be overridden via environment variables (RELAY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Seconds between server pings on each connection; 0 disables (default: 30)
# ping_interval_secs = 30

# Seconds to wait for a pong before closing the connection (default: 10)
# pong_timeout_secs = 10

# Maximum WebSocket message size in bytes (default: 65536)
# max_message_bytes = 65536
"#
    .to_string()
}
