//! Jump-host tunnel chain
//!
//! ```text
//! Client --SSH--> [hop 1] --direct-tcpip/SSH--> [hop 2] --direct-tcpip--> device
//! ```
//!
//! Each hop is owned by its own handle owner task. Hop 2 runs over a
//! `ChannelStream` opened on hop 1, and device streams are opened on the
//! last hop. Teardown goes from the last hop to the first.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::Msg;
use russh::ChannelStream;
use thiserror::Error;
use tracing::{info, warn};

use crate::inventory::JumpHostProfile;
use crate::ssh::{
    connect_direct, connect_over_stream, spawn_handle_owner_task, ConnectOptions,
    HandleController, PingResult, SshError, SshTarget,
};

/// Failure while building the chain; `hop` is 1-based
#[derive(Error, Debug)]
#[error("hop {hop}: {source}")]
pub struct HopError {
    pub hop: usize,
    #[source]
    pub source: SshError,
}

/// An established chain of jump hosts
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Open a byte stream from the last hop to `host:port`
    async fn open_stream(&self, host: &str, port: u16) -> Result<ChannelStream<Msg>, SshError>;

    /// Keepalive probe across every hop
    async fn ping(&self) -> PingResult;

    /// Whether every hop's owner task is still running
    fn is_alive(&self) -> bool;

    /// Close all hops, last first
    async fn close(&self);
}

/// Builds tunnels from resolved jump-host profiles
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    async fn connect(&self, hops: &[JumpHostProfile]) -> Result<Arc<dyn Tunnel>, HopError>;
}

fn target_for(profile: &JumpHostProfile) -> SshTarget {
    SshTarget::new(
        profile.host.clone(),
        profile.port,
        profile.username.clone(),
        profile.password.clone(),
    )
}

/// russh-backed tunnel connector
pub struct SshTunnelConnector {
    options: ConnectOptions,
}

impl SshTunnelConnector {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TunnelConnector for SshTunnelConnector {
    async fn connect(&self, hops: &[JumpHostProfile]) -> Result<Arc<dyn Tunnel>, HopError> {
        let mut controllers: Vec<HandleController> = Vec::with_capacity(hops.len());

        for (index, profile) in hops.iter().enumerate() {
            let hop = index + 1;
            let target = target_for(profile);

            let connected = match controllers.last() {
                None => connect_direct(&target, &self.options).await,
                Some(previous) => {
                    match previous
                        .open_direct_tcpip(&target.host, u32::from(target.port), "127.0.0.1", 0)
                        .await
                    {
                        Ok(channel) => {
                            connect_over_stream(&target, channel.into_stream(), &self.options).await
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            match connected {
                Ok(handle) => {
                    info!("Jump host {} ({}) connected", hop, profile.name);
                    controllers.push(spawn_handle_owner_task(
                        handle,
                        format!("jumphost {} ({})", hop, profile.name),
                    ));
                }
                Err(source) => {
                    warn!("Jump host {} ({}) failed: {}", hop, profile.name, source);
                    close_chain(&controllers).await;
                    return Err(HopError { hop, source });
                }
            }
        }

        if controllers.is_empty() {
            return Err(HopError {
                hop: 1,
                source: SshError::Connect("no jump hosts given".into()),
            });
        }

        let tunnel: Arc<dyn Tunnel> = Arc::new(SshTunnel { hops: controllers });
        Ok(tunnel)
    }
}

async fn close_chain(controllers: &[HandleController]) {
    for controller in controllers.iter().rev() {
        controller.disconnect().await;
    }
}

/// Tunnel made of one handle owner task per hop
pub struct SshTunnel {
    hops: Vec<HandleController>,
}

#[async_trait]
impl Tunnel for SshTunnel {
    async fn open_stream(&self, host: &str, port: u16) -> Result<ChannelStream<Msg>, SshError> {
        let last = self.hops.last().ok_or(SshError::Closed)?;
        let channel = last
            .open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await?;
        Ok(channel.into_stream())
    }

    async fn ping(&self) -> PingResult {
        let mut worst = PingResult::Ok;
        for controller in &self.hops {
            match controller.ping().await {
                PingResult::Ok => {}
                PingResult::Timeout => worst = PingResult::Timeout,
                PingResult::IoError => return PingResult::IoError,
            }
        }
        worst
    }

    fn is_alive(&self) -> bool {
        self.hops.iter().all(HandleController::is_connected)
    }

    async fn close(&self) {
        close_chain(&self.hops).await;
    }
}
