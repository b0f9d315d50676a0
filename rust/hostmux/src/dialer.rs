use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens the outbound connection for a sniffed hostname.
pub trait Dialer: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(&self, host: &str, port: u16) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Plain TCP connect, resolving `host` through the system resolver.
#[derive(Clone, Debug, Default)]
pub struct TcpDialer {
    /// None waits as long as the OS does.
    pub connect_timeout: Option<Duration>,
}

impl TcpDialer {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

impl Dialer for TcpDialer {
    type Stream = TcpStream;

    async fn dial(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let connect = TcpStream::connect((host, port));
        let stream = match self.connect_timeout {
            Some(t) => tokio::time::timeout(t, connect).await.map_err(|_| {
                io::Error::new(io::ErrorKind::TimedOut, format!("connect timed out after {t:?}"))
            })??,
            None => connect.await?,
        };
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }
}
