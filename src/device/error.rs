//! Device session errors

use thiserror::Error;

use crate::ssh::SshError;

fn chain(hops: &[String]) -> String {
    if hops.is_empty() {
        "direct".to_string()
    } else {
        hops.join(" -> ")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown credential profile '{0}'")]
    UnknownCredential(String),

    #[error("unsupported device type '{0}'")]
    UnsupportedDeviceType(String),

    #[error("gateway via {} required but not connected", chain(.expected))]
    GatewayRequired { expected: Vec<String> },

    #[error("gateway mismatch: device expects {}, active gateway is {}", chain(.expected), chain(.active))]
    GatewayMismatch {
        expected: Vec<String>,
        active: Vec<String>,
    },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("command failed: {0}")]
    Command(String),
}

impl From<SshError> for SessionError {
    fn from(err: SshError) -> Self {
        match err {
            SshError::Auth(msg) => SessionError::AuthFailed(msg),
            SshError::Timeout(msg) => SessionError::Timeout(msg),
            other => SessionError::Unreachable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_error_mapping() {
        assert!(matches!(
            SessionError::from(SshError::Auth("bad".into())),
            SessionError::AuthFailed(_)
        ));
        assert!(matches!(
            SessionError::from(SshError::Timeout("slow".into())),
            SessionError::Timeout(_)
        ));
        assert!(matches!(
            SessionError::from(SshError::Closed),
            SessionError::Unreachable(_)
        ));
    }

    #[test]
    fn test_mismatch_message() {
        let err = SessionError::GatewayMismatch {
            expected: vec!["b1".into(), "b2".into()],
            active: vec!["b1".into()],
        };
        assert_eq!(
            err.to_string(),
            "gateway mismatch: device expects b1 -> b2, active gateway is b1"
        );
    }
}
