//! Gateway module - the process-wide jump-host tunnel
//!
//! Device sessions for devices behind jump hosts are multiplexed over one
//! tunnel of one or two hops, managed by [`GatewayManager`].

mod error;
mod manager;
mod tunnel;
mod types;

pub use error::GatewayError;
pub use manager::{ActiveTunnel, GatewayManager, LIVENESS_FAIL_THRESHOLD};
pub use tunnel::{HopError, SshTunnel, SshTunnelConnector, Tunnel, TunnelConnector};
pub use types::{GatewaySnapshot, GatewayStatus};
