use crate::session::Session;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;

/// Upper bound for a single read. Every handshake message fits; the relay
/// forwards in chunks of at most this size.
const READ_LIMIT: usize = 512;

/// One endpoint of an open byte stream, tagged with the peer address it was
/// accepted from or dialed to.
pub struct Connection<T> {
    stream: T,
    address: SocketAddr,
}

pub type TcpConnection = Connection<TcpStream>;

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn new(stream: T, address: SocketAddr) -> Self {
        Connection { stream, address }
    }

    /// Peer address, as observed locally
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// One read of up to 512 bytes. An empty result is EOF. Cancel-safe: a
    /// read that loses a race has consumed nothing.
    pub async fn read(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = [0u8; READ_LIMIT];
        let n = self.stream.read(&mut buf).await?;
        Ok(buf[..n].to_vec())
    }

    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl Connection<TcpStream> {
    /// Dial a destination and wrap the resulting stream.
    pub async fn open(destination: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(destination).await?;
        Ok(Connection::new(stream, destination))
    }
}

/// The callbacks gluing accepted clients to the protocol engine. The
/// transport driver itself carries no protocol knowledge.
#[async_trait]
pub trait ClientHandler: Send + Sync + 'static {
    /// Runs policy checks and the handshake. Returns the destination to
    /// dial, or `None` to drop the client (any reply is already sent).
    async fn on_client_connected(&self, client: &mut TcpConnection) -> Option<SocketAddr>;

    /// The destination did not accept a connection.
    async fn on_remote_unreachable(&self, client: &mut TcpConnection, destination: SocketAddr);

    /// The remote is open; the success reply goes out here.
    async fn on_remote_opened(
        &self,
        client: &mut TcpConnection,
        remote: &mut TcpConnection,
    ) -> io::Result<()>;
}

/// TCP listener owning the accept loop and every per-client lifecycle.
pub struct TcpTransport {
    listener: TcpListener,
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub async fn bind(host: &str, port: u16, timeout: Option<Duration>) -> io::Result<Self> {
        info!("Listening on {}:{}", host, port);
        Ok(TcpTransport {
            listener: TcpListener::bind((host, port)).await?,
            timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts forever. Each client runs in its own task; nothing a client
    /// does can take the listener down.
    pub async fn serve<H: ClientHandler>(&mut self, handler: Arc<H>) {
        info!("Serving Connections...");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept client: {}", err);
                    continue;
                }
            };
            let handler = handler.clone();
            let timeout = self.timeout;
            tokio::spawn(async move {
                handle_client(handler, stream, peer, timeout).await;
            });
        }
    }
}

/// Lifecycle of one accepted client: handshake, dial, success reply, relay.
/// Both connections are shut down on every exit path.
async fn handle_client<H: ClientHandler>(
    handler: Arc<H>,
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Option<Duration>,
) {
    let mut client = Connection::new(stream, peer);

    let handshake = handler.on_client_connected(&mut client);
    let destination = match timeout {
        Some(limit) => match time::timeout(limit, handshake).await {
            Ok(destination) => destination,
            Err(_) => {
                debug!("{} handshake timed out", peer);
                None
            }
        },
        None => handshake.await,
    };
    let destination = match destination {
        Some(destination) => destination,
        None => {
            let _ = client.shutdown().await;
            return;
        }
    };

    let dial = Connection::open(destination);
    let dialed = match timeout {
        Some(limit) => match time::timeout(limit, dial).await {
            Ok(dialed) => dialed,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        },
        None => dial.await,
    };
    let mut remote = match dialed {
        Ok(remote) => remote,
        Err(err) => {
            debug!("{} can't reach {}: {}", peer, destination, err);
            handler.on_remote_unreachable(&mut client, destination).await;
            let _ = client.shutdown().await;
            return;
        }
    };

    match handler.on_remote_opened(&mut client, &mut remote).await {
        Ok(()) => {
            info!("{} start messaging with {}", peer, destination);
            if let Err(err) = Session::with_timeout(&mut client, &mut remote, timeout)
                .run()
                .await
            {
                warn!("{} relay failed: {}", peer, err);
            }
            info!("{} stop messaging with {}", peer, destination);
        }
        Err(err) => {
            warn!("{} failed to start messaging: {}", peer, err);
        }
    }

    let _ = client.shutdown().await;
    let _ = remote.shutdown().await;
}
