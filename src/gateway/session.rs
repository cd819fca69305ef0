use async_trait::async_trait;
use std::sync::Arc;

use super::mysql::MySqlSession;
use super::{GatewayError, PolicySession, SessionOpener, SshCredentials, SshTunnel};
use crate::config::GatewayConfig;

/// Production [`SessionOpener`]: a fresh SSH tunnel and MySQL connection per call.
pub struct TunnelGateway {
    config: Arc<GatewayConfig>,
}

impl TunnelGateway {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }

    async fn connect(&self, credentials: &SshCredentials) -> Result<MySqlSession, GatewayError> {
        let mysql = &self.config.mysql;
        let tunnel = SshTunnel::start(&self.config.ssh, &mysql.host, mysql.port, credentials).await?;
        MySqlSession::connect(tunnel, mysql).await
    }
}

#[async_trait]
impl SessionOpener for TunnelGateway {
    async fn open(&self, credentials: &SshCredentials) -> Result<Box<dyn PolicySession>, GatewayError> {
        let limit = self.config.api.connect_timeout();

        // A timed-out open drops whatever was half-built; the tunnel's Drop stops forwarding.
        let session = tokio::time::timeout(limit, self.connect(credentials))
            .await
            .map_err(|_| GatewayError::Timeout(limit))??;

        tracing::info!(user = %credentials.ssh_user, "session opened");
        Ok(Box::new(session))
    }
}
