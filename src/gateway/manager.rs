//! Gateway Manager
//!
//! Owns at most one jump-host tunnel for the whole process.
//!
//! # State machine
//!
//! ```text
//! disconnected --connect--> connecting --ok--> connected --probe failure--> error
//!      ^                        |                  |                          |
//!      |                        +------fail--------+------------> error       |
//!      +---------------------------- disconnect (any state) ------------------+
//! ```
//!
//! The state lock is never held across network I/O. Every transition bumps
//! a generation counter so that a connect attempt or liveness task that
//! outlived a `disconnect()` can tell its view of the world is stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::GatewayError;
use super::tunnel::{SshTunnelConnector, Tunnel, TunnelConnector};
use super::types::{GatewaySnapshot, GatewayStatus};
use crate::config::GatewayConfig;
use crate::inventory::{Inventory, JumpHostProfile};
use crate::ssh::PingResult;

/// Consecutive probe timeouts before the tunnel is declared dead
pub const LIVENESS_FAIL_THRESHOLD: u32 = 3;

/// Live tunnel plus the hop names it was built from
#[derive(Clone)]
pub struct ActiveTunnel {
    pub tunnel: Arc<dyn Tunnel>,
    pub hops: Vec<String>,
}

struct GatewayState {
    status: GatewayStatus,
    hop1: Option<String>,
    hop2: Option<String>,
    last_error: Option<String>,
    tunnel: Option<Arc<dyn Tunnel>>,
    liveness: Option<JoinHandle<()>>,
    generation: u64,
}

impl GatewayState {
    fn snapshot(&self) -> GatewaySnapshot {
        GatewaySnapshot {
            status: self.status,
            hop1: self.hop1.clone(),
            hop2: self.hop2.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn hops(&self) -> Vec<String> {
        self.hop1.iter().chain(self.hop2.iter()).cloned().collect()
    }
}

pub struct GatewayManager {
    inventory: Arc<Inventory>,
    connector: Arc<dyn TunnelConnector>,
    liveness_interval: Duration,
    state: RwLock<GatewayState>,
}

impl GatewayManager {
    pub fn new(
        inventory: Arc<Inventory>,
        connector: Arc<dyn TunnelConnector>,
        liveness_interval: Duration,
    ) -> Self {
        Self {
            inventory,
            connector,
            liveness_interval,
            state: RwLock::new(GatewayState {
                status: GatewayStatus::Disconnected,
                hop1: None,
                hop2: None,
                last_error: None,
                tunnel: None,
                liveness: None,
                generation: 0,
            }),
        }
    }

    /// Manager backed by real SSH connections
    pub fn with_ssh(inventory: Arc<Inventory>, config: &GatewayConfig) -> Self {
        Self::new(
            inventory,
            Arc::new(SshTunnelConnector::new(config.connect_options())),
            config.liveness_interval(),
        )
    }

    /// Establish the tunnel through `hop1` and, optionally, `hop2`
    ///
    /// The connect itself runs on its own task so that a dropped caller
    /// cannot leave the manager stuck in `connecting`.
    pub async fn connect(
        self: &Arc<Self>,
        hop1: &str,
        hop2: Option<&str>,
    ) -> Result<GatewaySnapshot, GatewayError> {
        let hop2 = hop2.map(str::trim).filter(|h| !h.is_empty());
        let profiles = self.resolve(hop1.trim(), hop2)?;

        let generation = {
            let mut state = self.state.write().await;
            match state.status {
                GatewayStatus::Connected => return Err(GatewayError::AlreadyConnected),
                GatewayStatus::Connecting => return Err(GatewayError::ConnectInProgress),
                GatewayStatus::Disconnected | GatewayStatus::Error => {}
            }
            state.generation += 1;
            state.status = GatewayStatus::Connecting;
            state.hop1 = Some(profiles[0].name.clone());
            state.hop2 = profiles.get(1).map(|p| p.name.clone());
            state.last_error = None;
            state.generation
        };

        info!(
            "Gateway connecting via {}",
            profiles
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.finish_connect(generation, profiles).await })
            .await
            .map_err(|e| {
                error!("Gateway connect task failed: {}", e);
                GatewayError::Aborted
            })?
    }

    fn resolve(
        &self,
        hop1: &str,
        hop2: Option<&str>,
    ) -> Result<Vec<JumpHostProfile>, GatewayError> {
        let data = self.inventory.snapshot();
        let mut profiles = Vec::with_capacity(2);
        for name in std::iter::once(hop1).chain(hop2) {
            let profile = data
                .jumphost(name)
                .ok_or_else(|| GatewayError::InvalidProfile(name.to_string()))?;
            profiles.push(profile.clone());
        }
        Ok(profiles)
    }

    async fn finish_connect(
        self: Arc<Self>,
        generation: u64,
        profiles: Vec<JumpHostProfile>,
    ) -> Result<GatewaySnapshot, GatewayError> {
        let result = self.connector.connect(&profiles).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            drop(state);
            if let Ok(tunnel) = result {
                info!("Gateway disconnected while connecting; closing new tunnel");
                tunnel.close().await;
            }
            return Err(GatewayError::Aborted);
        }

        match result {
            Ok(tunnel) => {
                state.status = GatewayStatus::Connected;
                state.tunnel = Some(Arc::clone(&tunnel));
                state.liveness = Some(self.spawn_liveness(generation, tunnel));
                info!("Gateway connected");
                Ok(state.snapshot())
            }
            Err(e) => {
                let profile = profiles
                    .get(e.hop.saturating_sub(1))
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                let err = GatewayError::HopFailed {
                    hop: e.hop,
                    profile,
                    reason: e.source.to_string(),
                };
                state.status = GatewayStatus::Error;
                state.last_error = Some(err.to_string());
                error!("Gateway connect failed: {}", err);
                Err(err)
            }
        }
    }

    /// Tear the tunnel down; always ends in `disconnected`
    pub async fn disconnect(&self) -> GatewaySnapshot {
        let (tunnel, liveness) = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.status = GatewayStatus::Disconnected;
            state.hop1 = None;
            state.hop2 = None;
            state.last_error = None;
            (state.tunnel.take(), state.liveness.take())
        };

        if let Some(task) = liveness {
            task.abort();
        }
        if let Some(tunnel) = tunnel {
            info!("Gateway disconnecting");
            tunnel.close().await;
        } else {
            debug!("Gateway disconnect with no active tunnel");
        }

        GatewaySnapshot::disconnected()
    }

    /// Current state; a dead tunnel is never reported as connected
    pub async fn status(&self) -> GatewaySnapshot {
        let (snapshot, generation, dead) = {
            let state = self.state.read().await;
            let dead = state.status == GatewayStatus::Connected
                && state.tunnel.as_ref().map_or(true, |t| !t.is_alive());
            (state.snapshot(), state.generation, dead)
        };

        if !dead {
            return snapshot;
        }

        self.mark_failed(generation, "tunnel closed".to_string(), true)
            .await;
        self.state.read().await.snapshot()
    }

    /// The tunnel and its hop names, when connected
    pub async fn active_tunnel(&self) -> Option<ActiveTunnel> {
        let state = self.state.read().await;
        if state.status != GatewayStatus::Connected {
            return None;
        }
        let tunnel = state.tunnel.as_ref()?;
        Some(ActiveTunnel {
            tunnel: Arc::clone(tunnel),
            hops: state.hops(),
        })
    }

    /// Move `connected -> error` if `generation` is still current
    async fn mark_failed(&self, generation: u64, reason: String, abort_liveness: bool) {
        let (tunnel, liveness) = {
            let mut state = self.state.write().await;
            if state.generation != generation || state.status != GatewayStatus::Connected {
                return;
            }
            error!("Gateway tunnel lost: {}", reason);
            state.status = GatewayStatus::Error;
            state.last_error = Some(reason);
            (state.tunnel.take(), state.liveness.take())
        };

        if abort_liveness {
            if let Some(task) = liveness {
                task.abort();
            }
        }
        if let Some(tunnel) = tunnel {
            tunnel.close().await;
        }
    }

    fn spawn_liveness(self: &Arc<Self>, generation: u64, tunnel: Arc<dyn Tunnel>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = self.liveness_interval;

        tokio::spawn(async move {
            info!(
                "Gateway liveness task started (interval={}ms, threshold={})",
                period.as_millis(),
                LIVENESS_FAIL_THRESHOLD
            );
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;

            let mut failures = 0u32;
            loop {
                interval.tick().await;

                let probe = if tunnel.is_alive() {
                    tunnel.ping().await
                } else {
                    PingResult::IoError
                };

                let Some(manager) = manager.upgrade() else {
                    break;
                };

                match probe {
                    PingResult::Ok => {
                        failures = 0;
                        debug!("Gateway liveness probe OK");
                    }
                    PingResult::IoError => {
                        manager
                            .mark_failed(generation, "liveness probe failed: transport closed".into(), false)
                            .await;
                        break;
                    }
                    PingResult::Timeout => {
                        failures += 1;
                        warn!(
                            "Gateway liveness probe timeout ({}/{})",
                            failures, LIVENESS_FAIL_THRESHOLD
                        );
                        if failures >= LIVENESS_FAIL_THRESHOLD {
                            manager
                                .mark_failed(
                                    generation,
                                    format!("liveness probe timed out {} times", failures),
                                    false,
                                )
                                .await;
                            break;
                        }
                    }
                }
            }

            info!("Gateway liveness task stopped");
        })
    }
}
