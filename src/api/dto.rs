//! Request and response bodies

use serde::{Deserialize, Serialize};

use crate::gateway::GatewaySnapshot;
use crate::inventory::DeviceRecord;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub message: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub message: String,
    pub device: DeviceRecord,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub imported: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GatewayConnectRequest {
    pub jumphost1_profile: String,
    #[serde(default)]
    pub jumphost2_profile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayConnectResponse {
    pub status: &'static str,
    pub jumphost1: Option<String>,
    pub jumphost2: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayStatusResponse {
    pub connected: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jumphost1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jumphost2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<GatewaySnapshot> for GatewayStatusResponse {
    fn from(snapshot: GatewaySnapshot) -> Self {
        Self {
            connected: snapshot.is_connected(),
            status: snapshot.status.as_str(),
            jumphost1: snapshot.hop1,
            jumphost2: snapshot.hop2,
            error: snapshot.last_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}
