//! Session Builder
//!
//! Turns a device record into a connected, authenticated and driver-prepared
//! session, either directly or through the active gateway tunnel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::driver::{DeviceType, DriverContext};
use super::error::SessionError;
use super::session::DeviceSession;
use crate::config::BatchConfig;
use crate::gateway::GatewayManager;
use crate::inventory::{DeviceRecord, Inventory};
use crate::ssh::{
    connect_direct, connect_over_stream, spawn_handle_owner_task, ConnectOptions, SshTarget,
};

/// Opens sessions for device records
#[async_trait]
pub trait SessionOpener: Send + Sync {
    async fn open(&self, device: &DeviceRecord) -> Result<Box<dyn DeviceSession>, SessionError>;
}

pub struct SessionBuilder {
    inventory: Arc<Inventory>,
    gateway: Arc<GatewayManager>,
    options: ConnectOptions,
    max_output_bytes: usize,
}

impl SessionBuilder {
    pub fn new(
        inventory: Arc<Inventory>,
        gateway: Arc<GatewayManager>,
        config: &BatchConfig,
    ) -> Self {
        Self {
            inventory,
            gateway,
            options: config.connect_options(),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

#[async_trait]
impl SessionOpener for SessionBuilder {
    async fn open(&self, device: &DeviceRecord) -> Result<Box<dyn DeviceSession>, SessionError> {
        let credential = self
            .inventory
            .snapshot()
            .credential(&device.credential_name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownCredential(device.credential_name.clone()))?;

        let device_type: DeviceType = device.device_type.parse()?;
        let driver = device_type.driver();

        let target = SshTarget::new(
            device.host.clone(),
            device.port,
            credential.username.clone(),
            credential.password.clone(),
        );

        let expected: Vec<String> = device.hops().into_iter().map(String::from).collect();
        let handle = if expected.is_empty() {
            connect_direct(&target, &self.options).await?
        } else {
            let active = self
                .gateway
                .active_tunnel()
                .await
                .ok_or_else(|| SessionError::GatewayRequired {
                    expected: expected.clone(),
                })?;
            if active.hops != expected {
                return Err(SessionError::GatewayMismatch {
                    expected,
                    active: active.hops,
                });
            }

            debug!("{}: tunnelling via {}", device.name, expected.join(" -> "));
            let stream = active
                .tunnel
                .open_stream(&device.host, device.port)
                .await
                .map_err(|e| SessionError::Unreachable(format!("{} via gateway: {}", target.address(), e)))?;
            connect_over_stream(&target, stream, &self.options).await?
        };

        let controller = spawn_handle_owner_task(handle, format!("device {}", device.name));
        let ctx = DriverContext {
            device: device.name.clone(),
            secret: credential.secret.clone(),
            max_output_bytes: self.max_output_bytes,
        };

        match driver.start(controller.clone(), &ctx).await {
            Ok(session) => {
                info!("{}: {} session ready", device.name, driver.name());
                Ok(session)
            }
            Err(e) => {
                controller.disconnect().await;
                Err(e)
            }
        }
    }
}
