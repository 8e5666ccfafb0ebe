//! Gateway state types

use serde::Serialize;

/// Lifecycle of the process-wide jump-host tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl GatewayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayStatus::Disconnected => "disconnected",
            GatewayStatus::Connecting => "connecting",
            GatewayStatus::Connected => "connected",
            GatewayStatus::Error => "error",
        }
    }
}

/// Point-in-time view of the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewaySnapshot {
    pub status: GatewayStatus,
    pub hop1: Option<String>,
    pub hop2: Option<String>,
    pub last_error: Option<String>,
}

impl GatewaySnapshot {
    pub fn disconnected() -> Self {
        Self {
            status: GatewayStatus::Disconnected,
            hop1: None,
            hop2: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == GatewayStatus::Connected
    }
}
