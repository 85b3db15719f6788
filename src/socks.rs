use crate::tcp::Connection;
use crate::wire::{
    AuthMethods, AuthRequest, AuthResponse, ConnectRequest, ConnectResponse, GreetingRequest,
    GreetingResponse, ResponseCode, Socks4Command, Socks4Reply, Socks4Request, Socks4Response,
    Socks5Command, Socks5Dest,
};
use crate::CashmereError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::lookup_host;

/// Validates the userid of a SOCKS4 request. Implementations are the trust
/// boundary: they never fail, they answer. An implementation that can error
/// folds that into `false` itself.
#[async_trait]
pub trait Socks4Auther: Send + Sync {
    async fn authorize(&self, username: &str) -> bool;
}

/// Validates a username/password pair from the SOCKS5 sub-negotiation.
#[async_trait]
pub trait Socks5Auther: Send + Sync {
    async fn authorize(&self, username: &str, password: &str) -> bool;
}

/// Maps a domain name to an IPv4 address; `None` means unresolved (lookup
/// failures included).
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Option<Ipv4Addr>;
}

// Plain functions work as authers and resolvers as-is.
#[async_trait]
impl<F> Socks4Auther for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn authorize(&self, username: &str) -> bool {
        self(username)
    }
}

#[async_trait]
impl<F> Socks5Auther for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    async fn authorize(&self, username: &str, password: &str) -> bool {
        self(username, password)
    }
}

#[async_trait]
impl<F> Resolver for F
where
    F: Fn(&str) -> Option<Ipv4Addr> + Send + Sync,
{
    async fn resolve(&self, domain: &str) -> Option<Ipv4Addr> {
        self(domain)
    }
}

/// Credential table from the `proxy.auth` config section. SOCKS5 compares
/// the full pair; SOCKS4 has no password on the wire, so mere existence of
/// the username passes.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: HashMap<String, String>,
}

impl UserTable {
    pub fn new(users: HashMap<String, String>) -> Self {
        UserTable { users }
    }
}

#[async_trait]
impl Socks5Auther for UserTable {
    async fn authorize(&self, username: &str, password: &str) -> bool {
        self.users.get(username).map(String::as_str) == Some(password)
    }
}

#[async_trait]
impl Socks4Auther for UserTable {
    async fn authorize(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }
}

/// Resolver backed by the operating system, for the `socks4a`/`socks5h`
/// configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> Option<Ipv4Addr> {
        let addrs = lookup_host((domain, 0)).await.ok()?;
        for addr in addrs {
            if let SocketAddr::V4(addr) = addr {
                return Some(*addr.ip());
            }
        }
        None
    }
}

/// The protocol engine for the configured SOCKS version.
///
/// Both variants share the same surface: `handshake` drives the client to a
/// destination decision, and exactly one of `success`, `ruleset_reject` or
/// `target_unreachable` sends the terminal reply once the transport knows
/// the outcome.
pub enum Socks {
    V4(Socks4),
    V5(Socks5),
}

impl Socks {
    pub async fn handshake<T>(
        &self,
        client: &mut Connection<T>,
    ) -> Result<(SocketAddr, Option<String>), CashmereError>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match self {
            Socks::V4(socks) => socks.handshake(client).await,
            Socks::V5(socks) => socks.handshake(client).await,
        }
    }

    pub async fn success<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match self {
            Socks::V4(socks) => socks.success(client, destination).await,
            Socks::V5(socks) => socks.success(client, destination).await,
        }
    }

    pub async fn ruleset_reject<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match self {
            Socks::V4(socks) => socks.ruleset_reject(client, destination).await,
            Socks::V5(socks) => socks.ruleset_reject(client, destination).await,
        }
    }

    pub async fn target_unreachable<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match self {
            Socks::V4(socks) => socks.target_unreachable(client, destination).await,
            Socks::V5(socks) => socks.target_unreachable(client, destination).await,
        }
    }
}

/// SOCKS4 and SOCKS4a state machine.
pub struct Socks4 {
    auther: Option<Arc<dyn Socks4Auther>>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl Socks4 {
    pub fn new(auther: Option<Arc<dyn Socks4Auther>>, resolver: Option<Arc<dyn Resolver>>) -> Self {
        Socks4 { auther, resolver }
    }

    pub async fn handshake<T>(
        &self,
        client: &mut Connection<T>,
    ) -> Result<(SocketAddr, Option<String>), CashmereError>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let data = client.read().await?;
        let request = Socks4Request::parse(&data)?;
        let destination = request.destination;

        if request.command == Socks4Command::Bind {
            self.reply(client, Socks4Reply::Rejected, Some(destination))
                .await?;
            return Err(CashmereError::Reject);
        }

        match request.domain_name {
            None => {
                // username required as soon as an identd check is configured
                if self.auther.is_some() && request.username.is_none() {
                    self.reply(client, Socks4Reply::Rejected, Some(destination))
                        .await?;
                    return Err(CashmereError::Reject);
                }
                self.authorize(client, request.username.as_deref(), destination)
                    .await?;
                Ok((SocketAddr::V4(destination), None))
            }
            Some(domain_name) => {
                self.authorize(client, request.username.as_deref(), destination)
                    .await?;
                let resolver = match &self.resolver {
                    Some(resolver) => resolver,
                    None => {
                        self.reply(client, Socks4Reply::Rejected, Some(destination))
                            .await?;
                        return Err(CashmereError::Reject);
                    }
                };
                let resolved = match resolver.resolve(&domain_name).await {
                    Some(resolved) => resolved,
                    None => {
                        self.reply(client, Socks4Reply::Rejected, Some(destination))
                            .await?;
                        return Err(CashmereError::ResolveDomain(domain_name));
                    }
                };
                debug!("resolved {} to {}", domain_name, resolved);
                let destination = SocketAddrV4::new(resolved, destination.port());
                Ok((SocketAddr::V4(destination), Some(domain_name)))
            }
        }
    }

    pub async fn success<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, Socks4Reply::Granted, echo4(destination))
            .await
    }

    pub async fn ruleset_reject<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, Socks4Reply::Rejected, echo4(destination))
            .await
    }

    pub async fn target_unreachable<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, Socks4Reply::Rejected, echo4(destination))
            .await
    }

    /// Full identd matrix. The plain-SOCKS4 missing-username case never gets
    /// here; it is rejected with a plain `Rejected` beforehand.
    async fn authorize<T>(
        &self,
        client: &mut Connection<T>,
        username: Option<&str>,
        destination: SocketAddrV4,
    ) -> Result<(), CashmereError>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        match (username, &self.auther) {
            (None, None) => Ok(()),
            (Some(username), Some(auther)) => {
                if auther.authorize(username).await {
                    info!("{} authorized as {}", client.address(), username);
                    Ok(())
                } else {
                    info!("{} failed to authorize as {}", client.address(), username);
                    self.reply(client, Socks4Reply::IdentdRejected, Some(destination))
                        .await?;
                    Err(CashmereError::Authorization(username.to_string()))
                }
            }
            (Some(_), None) => {
                self.reply(client, Socks4Reply::IdentdNotReachable, Some(destination))
                    .await?;
                Err(CashmereError::Reject)
            }
            (None, Some(_)) => {
                self.reply(client, Socks4Reply::IdentdRejected, Some(destination))
                    .await?;
                Err(CashmereError::Reject)
            }
        }
    }

    async fn reply<T>(
        &self,
        client: &mut Connection<T>,
        reply: Socks4Reply,
        destination: Option<SocketAddrV4>,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        client
            .write(&Socks4Response::new(reply, destination).to_bytes())
            .await
    }
}

/// SOCKS4 replies can only echo an IPv4 destination.
fn echo4(destination: SocketAddr) -> Option<SocketAddrV4> {
    match destination {
        SocketAddr::V4(destination) => Some(destination),
        SocketAddr::V6(_) => None,
    }
}

/// SOCKS5 state machine: greeting, optional username/password
/// sub-negotiation, connect.
pub struct Socks5 {
    auther: Option<Arc<dyn Socks5Auther>>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl Socks5 {
    pub fn new(auther: Option<Arc<dyn Socks5Auther>>, resolver: Option<Arc<dyn Resolver>>) -> Self {
        Socks5 { auther, resolver }
    }

    pub async fn handshake<T>(
        &self,
        client: &mut Connection<T>,
    ) -> Result<(SocketAddr, Option<String>), CashmereError>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        // exactly one method is ever acceptable
        let advertised = if self.auther.is_some() {
            AuthMethods::UserPass
        } else {
            AuthMethods::NoAuth
        };

        let data = client.read().await?;
        let greeting = GreetingRequest::parse(&data)?;
        if !greeting.methods.contains(&advertised) {
            client
                .write(&GreetingResponse::new(AuthMethods::NoMethods).to_bytes())
                .await?;
            return Err(CashmereError::Reject);
        }
        client
            .write(&GreetingResponse::new(advertised).to_bytes())
            .await?;

        if let Some(auther) = &self.auther {
            let data = client.read().await?;
            let request = AuthRequest::parse(&data)?;
            let is_success = auther.authorize(&request.username, &request.password).await;
            client
                .write(&AuthResponse::new(is_success).to_bytes())
                .await?;
            if !is_success {
                info!(
                    "{} failed to authorize as {}",
                    client.address(),
                    request.username
                );
                return Err(CashmereError::Authorization(request.username));
            }
            info!("{} authorized as {}", client.address(), request.username);
        }

        let data = client.read().await?;
        let request = ConnectRequest::parse(&data)?;
        if request.command != Socks5Command::Connect {
            self.reply(client, ResponseCode::CommandNotSupported, None)
                .await?;
            return Err(CashmereError::Reject);
        }
        match request.dest {
            Socks5Dest::Ip(destination) => Ok((destination, None)),
            Socks5Dest::Domain(domain_name, port) => {
                let resolver = match &self.resolver {
                    Some(resolver) => resolver,
                    None => {
                        self.reply(client, ResponseCode::AddrTypeNotSupported, None)
                            .await?;
                        return Err(CashmereError::Reject);
                    }
                };
                match resolver.resolve(&domain_name).await {
                    Some(resolved) => {
                        debug!("resolved {} to {}", domain_name, resolved);
                        Ok((
                            SocketAddr::V4(SocketAddrV4::new(resolved, port)),
                            Some(domain_name),
                        ))
                    }
                    None => {
                        self.reply(client, ResponseCode::HostUnreachable, None)
                            .await?;
                        Err(CashmereError::ResolveDomain(domain_name))
                    }
                }
            }
            Socks5Dest::Unknown(_) => {
                self.reply(client, ResponseCode::AddrTypeNotSupported, None)
                    .await?;
                Err(CashmereError::Reject)
            }
        }
    }

    pub async fn success<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, ResponseCode::Success, Some(destination))
            .await
    }

    pub async fn ruleset_reject<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, ResponseCode::RuleFailure, Some(destination))
            .await
    }

    pub async fn target_unreachable<T>(
        &self,
        client: &mut Connection<T>,
        destination: SocketAddr,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.reply(client, ResponseCode::HostUnreachable, Some(destination))
            .await
    }

    async fn reply<T>(
        &self,
        client: &mut Connection<T>,
        reply: ResponseCode,
        destination: Option<SocketAddr>,
    ) -> io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin,
    {
        client
            .write(&ConnectResponse::new(reply, destination).to_bytes())
            .await
    }
}
