//! Request-scoped tunnel gateway.
//!
//! A session pairs one SSH tunnel with one MySQL connection opened through it.
//! Handlers open a session per request through [`SessionOpener`], run a single
//! policy operation, and close it again on every path. Nothing here is pooled
//! or shared between requests.

pub mod mysql;
pub mod row;
pub mod session;
pub mod tunnel;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

pub use session::TunnelGateway;
pub use tunnel::SshTunnel;

/// A policy row as column name -> value, in column order.
pub type PolicyRecord = Map<String, Value>;

/// Number of rows returned by the recent-policies listing.
pub const RECENT_POLICY_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to load private key {path}: {source}")]
    KeyLoad {
        path: String,
        #[source]
        source: russh_keys::Error,
    },

    #[error("ssh authentication rejected for user {user}")]
    AuthenticationRejected { user: String },

    #[error("failed to connect to ssh server {addr}: {source}")]
    SshConnect {
        addr: String,
        #[source]
        source: russh::Error,
    },

    #[error(transparent)]
    Ssh(#[from] russh::Error),

    #[error("tunnel error: {0}")]
    Tunnel(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("session open timed out after {0:?}")]
    Timeout(Duration),
}

/// Caller-supplied SSH credentials. Lives for one request and is never logged.
#[derive(Clone)]
pub struct SshCredentials {
    pub cert_location: String,
    pub ssh_user: String,
    pub ssh_password: String,
}

impl std::fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCredentials")
            .field("cert_location", &self.cert_location)
            .field("ssh_user", &self.ssh_user)
            .field("ssh_password", &"<redacted>")
            .finish()
    }
}

/// New coverage period for a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDates {
    pub policy_start: String,
    pub policy_end: String,
}

/// Opens one session per call. Implemented by [`TunnelGateway`] in production
/// and by recording fakes in tests.
#[async_trait]
pub trait SessionOpener: Send + Sync + 'static {
    async fn open(&self, credentials: &SshCredentials) -> Result<Box<dyn PolicySession>, GatewayError>;
}

/// A live tunnel + database connection. Callers must `close` it once the
/// operation is done, whether or not the operation succeeded.
#[async_trait]
pub trait PolicySession: Send {
    /// Most recently created policies, newest first.
    async fn recent_policies(&mut self, limit: u32) -> Result<Vec<PolicyRecord>, GatewayError>;

    /// First policy whose `policy_id` matches.
    async fn find_policy(&mut self, policy_id: &str) -> Result<Option<PolicyRecord>, GatewayError>;

    /// Set the dates of every row with this `policy_id` and commit.
    /// Returns the number of matching rows.
    async fn update_policy_dates(
        &mut self,
        policy_id: &str,
        dates: &PolicyDates,
    ) -> Result<u64, GatewayError>;

    /// Close the database connection, then stop the tunnel.
    async fn close(self: Box<Self>);
}
