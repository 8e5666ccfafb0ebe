//! russh client handler

use russh::client;
use russh::keys::PublicKey;
use tracing::info;

use super::error::SshError;

/// Client handler for russh callbacks
///
/// Jump hosts and network devices are reached by address from the inventory
/// and are not present in any known_hosts file, so every server key is
/// accepted. The key algorithm is logged per host so operators can correlate
/// a changed key with a connection.
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            "Accepting {:?} host key for {}:{}",
            server_public_key.algorithm(),
            self.host,
            self.port
        );
        Ok(true)
    }
}
