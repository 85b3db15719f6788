#![forbid(unsafe_code)]
//! A SOCKS4/SOCKS4a/SOCKS5 proxy server.
//!
//! The pieces: [`wire`] parses and serializes the protocol messages,
//! [`socks`] drives the handshake state machines, [`ruleset`] decides who
//! may connect where, [`session`] pumps bytes once a tunnel is up, and
//! [`tcp`] owns the listener and every per-client lifecycle. [`Proxy`] wires
//! them together behind the transport's callback seam.
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod ruleset;
pub mod session;
pub mod socks;
pub mod tcp;
pub mod wire;

use crate::config::{Config, ConfigError};
use crate::ruleset::Ruleset;
use crate::socks::Socks;
use crate::tcp::{ClientHandler, TcpConnection, TcpTransport};
use crate::wire::PackageError;

#[derive(Error, Debug)]
pub enum CashmereError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Undecodable bytes; the client gets no reply at all.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// The client failed authentication; the failure reply is already sent.
    #[error("authorization failed for `{0}`")]
    Authorization(String),

    /// The requested domain did not resolve; the reply is already sent.
    #[error("unable to resolve domain `{0}`")]
    ResolveDomain(String),

    /// Anything the engine turns away after sending a reject reply.
    #[error("request rejected")]
    Reject,
}

/// Policy checks wrapped around the protocol handshake. This is the
/// [`ClientHandler`] the transport driver runs; it owns the engine and the
/// ruleset and nothing else.
pub struct Proxy {
    socks: Socks,
    ruleset: Ruleset,
}

impl Proxy {
    pub fn new(socks: Socks, ruleset: Ruleset) -> Self {
        Proxy { socks, ruleset }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Proxy {
            socks: config.socks(),
            ruleset: config.ruleset()?,
        })
    }

    /// Bind the listener and serve until the process ends.
    pub async fn serve(self, host: &str, port: u16, timeout: Option<Duration>) -> io::Result<()> {
        let mut transport = TcpTransport::bind(host, port, timeout).await?;
        transport.serve(Arc::new(self)).await;
        Ok(())
    }
}

#[async_trait]
impl ClientHandler for Proxy {
    async fn on_client_connected(&self, client: &mut TcpConnection) -> Option<SocketAddr> {
        debug!("{} client connected", client.address());
        if !self.ruleset.should_allow_connecting(client.address()) {
            info!("{} connection blocked by ruleset", client.address());
            return None;
        }
        let (destination, domain_name) = match self.socks.handshake(client).await {
            Ok(handshake) => handshake,
            Err(CashmereError::Package(err)) => {
                info!("{} {}", client.address(), err);
                return None;
            }
            Err(err) => {
                info!("{} handshake failed: {}", client.address(), err);
                return None;
            }
        };
        if self
            .ruleset
            .should_allow_proxying(client.address(), destination, domain_name.as_deref())
        {
            return Some(destination);
        }
        if let Err(err) = self.socks.ruleset_reject(client, destination).await {
            warn!("{} failed to send reject reply: {}", client.address(), err);
        }
        None
    }

    async fn on_remote_unreachable(&self, client: &mut TcpConnection, destination: SocketAddr) {
        if let Err(err) = self.socks.target_unreachable(client, destination).await {
            warn!(
                "{} failed to send unreachable reply: {}",
                client.address(),
                err
            );
        }
        info!("{} remote {} unreachable", client.address(), destination);
    }

    async fn on_remote_opened(
        &self,
        client: &mut TcpConnection,
        remote: &mut TcpConnection,
    ) -> io::Result<()> {
        // the success reply echoes the destination the proxy dialed
        self.socks.success(client, remote.address()).await
    }
}
