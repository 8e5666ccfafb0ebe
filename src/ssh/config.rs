//! SSH endpoint configuration

use std::fmt;
use std::time::Duration;

/// A host we open an SSH session to: a jump host or a device.
///
/// Only password authentication is used; profiles in the inventory carry a
/// username and password and nothing else.
#[derive(Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SshTarget {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// `host:port`, with IPv6 literals bracketed so it resolves
    pub fn address(&self) -> String {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if host.contains(':') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

// Keep passwords out of logs
impl fmt::Debug for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport-level settings shared by every SSH connection we make
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Deadline for TCP connect + handshake, and separately for authentication
    pub timeout: Duration,
    /// Interval between protocol keepalives (`None` disables them)
    pub keepalive_interval: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            keepalive_interval: Some(Duration::from_secs(10)),
        }
    }
}
