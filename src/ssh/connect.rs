//! Direct and stream-based SSH connects
//!
//! Every session in this crate is built from two primitives:
//!
//! ```text
//! connect_direct:       Client --TCP/SSH--> Host
//! connect_over_stream:  Client --SSH--> [Hop] --direct-tcpip--> Host   (SSH-over-SSH)
//! ```
//!
//! `connect_over_stream` takes a `ChannelStream` opened on the previous hop and
//! runs a full SSH handshake over it via `russh::client::connect_stream()`.

use std::sync::Arc;

use russh::client::{self, Handle, Msg};
use russh::ChannelStream;
use tracing::{debug, info};

use super::client::ClientHandler;
use super::config::{ConnectOptions, SshTarget};
use super::error::SshError;

fn client_config(options: &ConnectOptions) -> Arc<client::Config> {
    Arc::new(client::Config {
        // Disabled: the gateway liveness task and per-device timeouts handle liveness
        inactivity_timeout: None,
        keepalive_interval: options.keepalive_interval,
        keepalive_max: 3,
        ..Default::default()
    })
}

/// Connect directly to a host over TCP and authenticate
pub async fn connect_direct(
    target: &SshTarget,
    options: &ConnectOptions,
) -> Result<Handle<ClientHandler>, SshError> {
    let addr = target.address();
    info!("Connecting to {}", addr);

    let handler = ClientHandler::new(target.host.clone(), target.port);

    let mut handle = tokio::time::timeout(options.timeout, async {
        let socket_addr = tokio::net::lookup_host(addr.as_str())
            .await
            .map_err(|e| SshError::Connect(format!("Failed to resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| SshError::Connect(format!("No address found for {}", addr)))?;

        client::connect(client_config(options), socket_addr, handler)
            .await
            .map_err(|e| SshError::Connect(format!("{}: {}", addr, e)))
    })
    .await
    .map_err(|_| SshError::Timeout(format!("Connection to {} timed out", addr)))??;

    debug!("SSH handshake with {} completed", addr);

    if let Err(e) = authenticate(&mut handle, target, options).await {
        close_handle(handle, "Authentication failed").await;
        return Err(e);
    }
    Ok(handle)
}

/// Connect to a host through a stream opened on a previous hop
pub async fn connect_over_stream(
    target: &SshTarget,
    stream: ChannelStream<Msg>,
    options: &ConnectOptions,
) -> Result<Handle<ClientHandler>, SshError> {
    let addr = target.address();
    info!("Connecting via stream to {} (SSH-over-SSH)", addr);

    let handler = ClientHandler::new(target.host.clone(), target.port);

    let mut handle = tokio::time::timeout(
        options.timeout,
        client::connect_stream(client_config(options), stream, handler),
    )
    .await
    .map_err(|_| SshError::Timeout(format!("Connection to {} via stream timed out", addr)))?
    .map_err(|e| {
        SshError::Connect(format!("Failed to connect via stream to {}: {}", addr, e))
    })?;

    debug!("SSH handshake via stream with {} completed", addr);

    if let Err(e) = authenticate(&mut handle, target, options).await {
        close_handle(handle, "Authentication failed").await;
        return Err(e);
    }
    Ok(handle)
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    target: &SshTarget,
    options: &ConnectOptions,
) -> Result<(), SshError> {
    let result = tokio::time::timeout(
        options.timeout,
        handle.authenticate_password(&target.username, &target.password),
    )
    .await
    .map_err(|_| SshError::Timeout(format!("Authentication to {} timed out", target.host)))?
    .map_err(|e| SshError::Auth(e.to_string()))?;

    if !result.success() {
        return Err(SshError::Auth(format!(
            "Authentication to {} as {} rejected",
            target.host, target.username
        )));
    }

    info!("Authenticated to {} as {}", target.host, target.username);
    Ok(())
}

/// Best-effort SSH disconnect for a handle that was never handed to an owner task
async fn close_handle(handle: Handle<ClientHandler>, reason: &str) {
    if let Err(e) = handle
        .disconnect(russh::Disconnect::ByApplication, reason, "en")
        .await
    {
        debug!("Ignoring error while closing SSH handle: {}", e);
    }
}
