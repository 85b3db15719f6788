use crate::tcp::Connection;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time;

enum Side {
    Client,
    Remote,
}

/// Bidirectional byte pump between an accepted client and its remote.
///
/// Borrows both connections for its lifetime; closing them stays the
/// transport driver's job.
pub struct Session<'a, C, R> {
    client: &'a mut Connection<C>,
    remote: &'a mut Connection<R>,
    timeout: Option<Duration>,
}

impl<'a, C, R> Session<'a, C, R>
where
    C: AsyncRead + AsyncWrite + Send + Unpin,
    R: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn new(client: &'a mut Connection<C>, remote: &'a mut Connection<R>) -> Self {
        Session {
            client,
            remote,
            timeout: None,
        }
    }

    pub fn with_timeout(
        client: &'a mut Connection<C>,
        remote: &'a mut Connection<R>,
        timeout: Option<Duration>,
    ) -> Self {
        Session {
            client,
            remote,
            timeout,
        }
    }

    /// Pumps until either side reaches EOF, a read fails, or the optional
    /// idle timeout fires. Write errors surface to the caller; everything
    /// else is an orderly stop.
    pub async fn run(&mut self) -> io::Result<()> {
        let Session {
            client,
            remote,
            timeout,
        } = self;
        let idle = *timeout;
        loop {
            // Fair race between one read per side. The loser has consumed
            // nothing (reads are cancel-safe), so dropping and re-issuing it
            // each turn loses no bytes and keeps per-direction ordering.
            let wait = async {
                tokio::select! {
                    read = client.read() => (Side::Client, read),
                    read = remote.read() => (Side::Remote, read),
                }
            };
            let completed = match idle {
                Some(limit) => time::timeout(limit, wait).await.ok(),
                None => Some(wait.await),
            };
            let (side, read) = match completed {
                Some(completed) => completed,
                None => {
                    debug!(
                        "{} <-> {} idle, closing",
                        client.address(),
                        remote.address()
                    );
                    break;
                }
            };
            let data = match read {
                Ok(data) => data,
                // a broken read ends the relay the same way an EOF does
                Err(_) => break,
            };
            if data.is_empty() {
                break;
            }
            match side {
                Side::Client => {
                    remote.write(&data).await?;
                    debug!(
                        "{} -> {} bytes -> {}",
                        client.address(),
                        data.len(),
                        remote.address()
                    );
                }
                Side::Remote => {
                    client.write(&data).await?;
                    debug!(
                        "{} <- {} bytes <- {}",
                        client.address(),
                        data.len(),
                        remote.address()
                    );
                }
            }
        }
        Ok(())
    }
}
