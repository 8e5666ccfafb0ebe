//! Handle Owner Task
//!
//! This module implements the "single owner" pattern for SSH Handle.
//!
//! # Architecture
//!
//! Only one task owns the `Handle<ClientHandler>`. All other components
//! communicate with it via `HandleController` which sends commands through
//! an mpsc channel.
//!
//! The gateway uses one owner task per hop: many device tasks open
//! `direct-tcpip` channels through the same hop concurrently, and the
//! liveness task pings it, without ever sharing `&mut Handle`.
//!
//! # Usage
//!
//! ```ignore
//! let controller = spawn_handle_owner_task(handle, "bastion1".into());
//!
//! // Tunnel to a device behind the hop
//! let channel = controller.open_direct_tcpip("10.0.0.1", 22, "127.0.0.1", 0).await?;
//! ```

use std::time::Duration;

use russh::client::{Handle, Msg};
use russh::Channel;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::client::ClientHandler;
use super::error::SshError;

const PING_TIMEOUT: Duration = Duration::from_secs(5);
/// How often an idle owner task checks whether russh has closed the session
const CLOSED_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of a keepalive probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingResult {
    /// Connection is healthy
    Ok,
    /// No reply in time (may be transient)
    Timeout,
    /// Transport is gone
    IoError,
}

/// Commands sent to the Handle Owner Task
pub enum HandleCommand {
    /// Open a session channel (shell / exec)
    ChannelOpenSession {
        reply_tx: oneshot::Sender<Result<Channel<Msg>, russh::Error>>,
    },

    /// Open a direct-tcpip channel (tunnel to the next hop or a device)
    ChannelOpenDirectTcpip {
        host: String,
        port: u32,
        originator_host: String,
        originator_port: u32,
        reply_tx: oneshot::Sender<Result<Channel<Msg>, russh::Error>>,
    },

    /// Ping the connection (keepalive@openssh.com with want_reply)
    Ping {
        reply_tx: oneshot::Sender<PingResult>,
    },

    /// Disconnect the SSH connection
    Disconnect,
}

/// Controller for sending commands to the Handle Owner Task
///
/// Cloning is cheap (just copies the Sender). The owner task exits once
/// every controller is dropped or `disconnect` is called.
#[derive(Clone)]
pub struct HandleController {
    cmd_tx: mpsc::Sender<HandleCommand>,
}

impl HandleController {
    /// Create a controller around an existing command sender
    ///
    /// Used by tests; production code goes through `spawn_handle_owner_task`.
    pub fn new(cmd_tx: mpsc::Sender<HandleCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Open a session channel
    pub async fn open_session_channel(&self) -> Result<Channel<Msg>, SshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(HandleCommand::ChannelOpenSession { reply_tx })
            .await
            .map_err(|_| SshError::Closed)?;
        reply_rx
            .await
            .map_err(|_| SshError::Closed)?
            .map_err(|e| SshError::Channel(e.to_string()))
    }

    /// Open a direct-tcpip channel
    pub async fn open_direct_tcpip(
        &self,
        host: &str,
        port: u32,
        originator_host: &str,
        originator_port: u32,
    ) -> Result<Channel<Msg>, SshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(HandleCommand::ChannelOpenDirectTcpip {
                host: host.to_string(),
                port,
                originator_host: originator_host.to_string(),
                originator_port,
                reply_tx,
            })
            .await
            .map_err(|_| SshError::Closed)?;
        reply_rx
            .await
            .map_err(|_| SshError::Closed)?
            .map_err(|e| SshError::Channel(e.to_string()))
    }

    /// Disconnect the SSH connection
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(HandleCommand::Disconnect).await;
    }

    /// Ping the connection
    pub async fn ping(&self) -> PingResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(HandleCommand::Ping { reply_tx }).await.is_err() {
            return PingResult::IoError;
        }
        reply_rx.await.unwrap_or(PingResult::IoError)
    }

    /// Check if the Handle Owner Task is still running
    pub fn is_connected(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

/// Spawn the Handle Owner Task
///
/// Consumes ownership of the Handle and returns a cloneable controller.
/// `label` only appears in logs.
pub fn spawn_handle_owner_task(handle: Handle<ClientHandler>, label: String) -> HandleController {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<HandleCommand>(64);

    tokio::spawn(async move {
        let handle = handle;

        info!("Handle owner task started for {}", label);

        let mut closed_poll = tokio::time::interval(CLOSED_POLL_INTERVAL);
        closed_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let cmd = tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
                _ = closed_poll.tick() => {
                    // Exiting closes the command channel, which is what
                    // `HandleController::is_connected` observes
                    if handle.is_closed() {
                        warn!("SSH session to {} closed by peer", label);
                        break;
                    }
                    continue;
                }
            };

            match cmd {
                HandleCommand::ChannelOpenSession { reply_tx } => {
                    let result = handle.channel_open_session().await;
                    if reply_tx.send(result).is_err() {
                        warn!("Caller dropped before receiving channel_open_session result");
                    }
                }

                HandleCommand::ChannelOpenDirectTcpip {
                    host,
                    port,
                    originator_host,
                    originator_port,
                    reply_tx,
                } => {
                    let result = handle
                        .channel_open_direct_tcpip(host, port, originator_host, originator_port)
                        .await;
                    if reply_tx.send(result).is_err() {
                        warn!("Caller dropped before receiving direct_tcpip result");
                    }
                }

                HandleCommand::Ping { reply_tx } => {
                    debug!("Keepalive probe for {}", label);
                    let result =
                        match tokio::time::timeout(PING_TIMEOUT, handle.send_keepalive(true)).await {
                            Ok(Ok(())) => PingResult::Ok,
                            Ok(Err(e)) => {
                                warn!("Keepalive failed for {}: {:?}", label, e);
                                PingResult::IoError
                            }
                            Err(_) => {
                                warn!("Keepalive timeout for {} ({}s)", label, PING_TIMEOUT.as_secs());
                                PingResult::Timeout
                            }
                        };
                    let _ = reply_tx.send(result);
                }

                HandleCommand::Disconnect => {
                    info!("Disconnect requested for {}", label);
                    break;
                }
            }
        }

        drain_pending_commands(&mut cmd_rx);

        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
            .await;
        info!("Handle owner task terminated for {}", label);
    });

    HandleController { cmd_tx }
}

/// Drain all pending commands, returning Disconnected error to each
fn drain_pending_commands(cmd_rx: &mut mpsc::Receiver<HandleCommand>) {
    cmd_rx.close();

    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            HandleCommand::ChannelOpenSession { reply_tx } => {
                let _ = reply_tx.send(Err(russh::Error::Disconnect));
            }
            HandleCommand::ChannelOpenDirectTcpip { reply_tx, .. } => {
                let _ = reply_tx.send(Err(russh::Error::Disconnect));
            }
            HandleCommand::Ping { reply_tx } => {
                let _ = reply_tx.send(PingResult::IoError);
            }
            HandleCommand::Disconnect => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_reply_is_forwarded() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);
        let controller = HandleController::new(cmd_tx);

        tokio::spawn(async move {
            if let Some(HandleCommand::Ping { reply_tx }) = cmd_rx.recv().await {
                let _ = reply_tx.send(PingResult::Timeout);
            }
        });

        assert_eq!(controller.ping().await, PingResult::Timeout);
    }

    #[tokio::test]
    async fn test_ping_after_owner_exit_is_io_error() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let controller = HandleController::new(cmd_tx);
        drop(cmd_rx);

        assert!(!controller.is_connected());
        assert_eq!(controller.ping().await, PingResult::IoError);
    }

    #[tokio::test]
    async fn test_open_channel_after_owner_exit_is_disconnected() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let controller = HandleController::new(cmd_tx);
        drop(cmd_rx);

        let err = controller
            .open_direct_tcpip("10.0.0.1", 22, "127.0.0.1", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, SshError::Closed));
    }

    #[tokio::test]
    async fn test_drain_answers_queued_pings() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(4);
        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx.send(HandleCommand::Ping { reply_tx }).await.unwrap();

        drain_pending_commands(&mut cmd_rx);

        assert_eq!(reply_rx.await.unwrap(), PingResult::IoError);
    }
}
