//! Application configuration types

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ssh::ConnectOptions;

/// Top-level configuration file (`config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Directory holding credentials.json, jumphosts.json and inventory.json
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data_dir: default_data_dir(),
            batch: BatchConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed to call the API from a browser
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Batch execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum simultaneous device sessions per batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Ceiling for one device: connect + authenticate + command + close
    #[serde(default = "default_device_timeout")]
    pub device_timeout_secs: u64,

    /// Deadline for the SSH handshake and for authentication to a device
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Captured output beyond this is truncated
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Time in-flight devices get to finish after a cancel
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            device_timeout_secs: default_device_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_output_bytes: default_max_output_bytes(),
            cancel_grace_secs: default_cancel_grace(),
        }
    }
}

impl BatchConfig {
    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_secs(self.connect_timeout_secs),
            keepalive_interval: None,
        }
    }
}

/// Jump-host gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Deadline for each hop's handshake and authentication
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How often the liveness task probes the tunnel
    #[serde(default = "default_liveness_interval")]
    pub liveness_interval_secs: u64,

    /// Protocol-level keepalive on each hop
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            liveness_interval_secs: default_liveness_interval(),
            keepalive_interval_secs: default_keepalive_interval(),
        }
    }
}

impl GatewayConfig {
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs.max(1))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            timeout: Duration::from_secs(self.connect_timeout_secs),
            keepalive_interval: Some(Duration::from_secs(self.keepalive_interval_secs)),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3003".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8000".to_string(),
    ]
}

fn default_max_concurrency() -> usize {
    5
}

fn default_device_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_cancel_grace() -> u64 {
    5
}

fn default_liveness_interval() -> u64 {
    5
}

fn default_keepalive_interval() -> u64 {
    10
}
