//! Errors raised while connecting to or talking through an SSH peer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    /// TCP or SSH handshake could not be established
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The peer refused to open a session or direct-tcpip channel
    #[error("channel open failed: {0}")]
    Channel(String),

    #[error("ssh protocol: {0}")]
    Protocol(String),

    #[error("{0}")]
    Timeout(String),

    /// The owner task of the connection has exited
    #[error("connection closed")]
    Closed,
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_russh_errors_are_protocol_errors() {
        let err = SshError::from(russh::Error::Disconnect);
        assert!(matches!(err, SshError::Protocol(_)));
    }
}
