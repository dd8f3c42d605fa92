use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Nova real-time messaging server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "nova-realtime", version, about = "Nova presence and private messaging server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "NOVA_PORT", default_value = "3333")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "NOVA_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./nova.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "NOVA_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for the SQLite database
    #[arg(long, env = "NOVA_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// WebSocket keepalive configuration (loaded from [heartbeat] section in TOML)
    #[arg(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<HeartbeatConfig>,
}

/// Server-initiated ping/pong keepalive for WebSocket connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing the connection (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl HeartbeatConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3333,
            bind_address: "0.0.0.0".to_string(),
            config: "./nova.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            heartbeat: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (NOVA_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        Self::figment(cli).extract()
    }

    fn figment(cli: Config) -> Figment {
        let config_path = cli.config.clone();
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("NOVA_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn heartbeat(&self) -> HeartbeatConfig {
        self.heartbeat.unwrap_or_default()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Nova Real-time Server Configuration
# Place this file at ./nova.toml or specify with --config <path>
# All settings can be overridden via environment variables (NOVA_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3333)
# port = 3333

# Bind address (default: 0.0.0.0 - all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# ---- WebSocket keepalive ----
# [heartbeat]

# Seconds between server pings
# ping_interval_secs = 30

# Seconds to wait for a pong before the connection is closed
# pong_timeout_secs = 10
"#
    .to_string()
}
