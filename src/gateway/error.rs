//! Gateway error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Jump host profile '{0}' not found")]
    InvalidProfile(String),

    #[error("Gateway is already connected; disconnect first")]
    AlreadyConnected,

    #[error("A gateway connection is already in progress")]
    ConnectInProgress,

    #[error("Jump host {hop} ({profile}) failed: {reason}")]
    HopFailed {
        hop: usize,
        profile: String,
        reason: String,
    },

    #[error("Gateway connection aborted by disconnect")]
    Aborted,
}
