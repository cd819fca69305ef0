//! SSH local port forwarding over an in-process russh client.
//!
//! [`SshTunnel::start`] binds an ephemeral port on `127.0.0.1` and relays every
//! connection accepted there through a `direct-tcpip` channel to the remote
//! host/port as seen from the SSH server.

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::Disconnect;
use russh_keys::key;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use super::{GatewayError, SshCredentials};
use crate::config::SshConfig;

/// russh client callbacks. There is no known_hosts store on the gateway host,
/// so any server key is accepted.
pub struct TunnelClient {
    ssh_host: String,
}

#[async_trait]
impl client::Handler for TunnelClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(host = %self.ssh_host, "accepting ssh host key");
        Ok(true)
    }
}

/// An active SSH tunnel. Dropping it aborts all forwarding; `shutdown` also
/// disconnects the SSH session cleanly.
pub struct SshTunnel {
    ssh_addr: String,
    local_addr: SocketAddr,
    handle: Arc<Handle<TunnelClient>>,
    forwarder: JoinHandle<()>,
}

impl SshTunnel {
    /// Decrypt the caller's key, authenticate, and start forwarding to
    /// `remote_host:remote_port`.
    pub async fn start(
        ssh: &SshConfig,
        remote_host: &str,
        remote_port: u16,
        credentials: &SshCredentials,
    ) -> Result<Self, GatewayError> {
        let key_pair = load_key(credentials).await?;

        let ssh_addr = format!("{}:{}", ssh.host, ssh.port);
        let client = TunnelClient {
            ssh_host: ssh.host.clone(),
        };

        tracing::debug!(%ssh_addr, user = %credentials.ssh_user, "connecting to ssh server");
        let mut handle = client::connect(
            Arc::new(client::Config::default()),
            (ssh.host.as_str(), ssh.port),
            client,
        )
        .await
        .map_err(|source| GatewayError::SshConnect {
            addr: ssh_addr.clone(),
            source,
        })?;

        let authenticated = handle
            .authenticate_publickey(credentials.ssh_user.clone(), Arc::new(key_pair))
            .await?;
        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication rejected", "en")
                .await;
            return Err(GatewayError::AuthenticationRejected {
                user: credentials.ssh_user.clone(),
            });
        }

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| GatewayError::Tunnel(format!("failed to bind local port: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Tunnel(format!("failed to read local port: {}", e)))?;

        let handle = Arc::new(handle);
        let forwarder = tokio::spawn(forward_connections(
            listener,
            Arc::clone(&handle),
            remote_host.to_string(),
            remote_port,
        ));

        tracing::info!(
            "SSH tunnel established: {} -> {}:{} via {}",
            local_addr,
            remote_host,
            remote_port,
            ssh_addr
        );

        Ok(Self {
            ssh_addr,
            local_addr,
            handle,
            forwarder,
        })
    }

    /// Port the tunnel is listening on locally.
    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop forwarding and disconnect from the SSH server.
    pub async fn shutdown(self) {
        self.forwarder.abort();

        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("ssh disconnect from {} failed: {}", self.ssh_addr, e);
        }

        tracing::info!("SSH tunnel to {} shut down", self.ssh_addr);
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        // No-op after shutdown; covers panics and cancelled requests.
        self.forwarder.abort();
    }
}

/// Read and decrypt the caller's private key off the async workers; the
/// passphrase KDF is deliberately slow.
async fn load_key(credentials: &SshCredentials) -> Result<key::KeyPair, GatewayError> {
    let path = credentials.cert_location.clone();
    let password = credentials.ssh_password.clone();

    tokio::task::spawn_blocking(move || {
        russh_keys::load_secret_key(&path, Some(password.as_str()))
            .map_err(|source| GatewayError::KeyLoad { path, source })
    })
    .await
    .map_err(|e| GatewayError::Tunnel(format!("key loading task failed: {}", e)))?
}

async fn forward_connections(
    listener: TcpListener,
    handle: Arc<Handle<TunnelClient>>,
    remote_host: String,
    remote_port: u16,
) {
    // Relays live in this set so aborting the accept task aborts them too.
    let mut relays = JoinSet::new();

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("tunnel listener stopped accepting: {}", e);
                break;
            }
        };

        let handle = Arc::clone(&handle);
        let remote_host = remote_host.clone();
        relays.spawn(async move {
            if let Err(e) = relay(stream, peer, &handle, &remote_host, remote_port).await {
                tracing::debug!(%peer, "tunnel relay ended: {}", e);
            }
        });

        while relays.try_join_next().is_some() {}
    }

    while relays.join_next().await.is_some() {}
}

async fn relay(
    mut local: TcpStream,
    peer: SocketAddr,
    handle: &Handle<TunnelClient>,
    remote_host: &str,
    remote_port: u16,
) -> Result<(), GatewayError> {
    let channel = handle
        .channel_open_direct_tcpip(
            remote_host,
            u32::from(remote_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await?;

    let mut remote = channel.into_stream();
    let (sent, received) = tokio::io::copy_bidirectional(&mut local, &mut remote)
        .await
        .map_err(|e| GatewayError::Tunnel(format!("relay to {}:{} failed: {}", remote_host, remote_port, e)))?;

    tracing::trace!(%peer, sent, received, "tunnel relay closed");
    Ok(())
}
