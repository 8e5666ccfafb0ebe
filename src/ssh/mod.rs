//! SSH module - russh connections used by the gateway and device sessions
//!
//! # Features
//! - Direct SSH connections with password authentication
//! - SSH-over-SSH through `direct-tcpip` channels (jump host chains)
//! - Single-owner handle tasks with keepalive probes

mod client;
mod config;
mod connect;
mod error;
mod handle_owner;

pub use client::ClientHandler;
pub use config::{ConnectOptions, SshTarget};
pub use connect::{connect_direct, connect_over_stream};
pub use error::SshError;
pub use handle_owner::{spawn_handle_owner_task, HandleCommand, HandleController, PingResult};
