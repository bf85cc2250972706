//! Byte-stream opener: the pluggable dial strategy and its TCP default

use super::address::NetworkAddress;
use super::transport::Transport;
use futures::future::BoxFuture;
use socket2::{SockRef, TcpKeepalive};
use std::io;
use std::time::Duration;
use tokio::net::{TcpStream, UnixStream};

/// Default TCP keepalive idle interval
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(5 * 60);

/// Opens a raw byte stream to a resolved address.
///
/// Any closure `Fn(&NetworkAddress) -> BoxFuture<'static, io::Result<Transport>>`
/// is a dialer, which makes it easy to route connections through a proxy or an
/// in-memory stream in tests.
pub trait Dialer: Send + Sync {
    /// Open a stream to `addr`. Errors are surfaced unchanged to the caller.
    fn dial(&self, addr: &NetworkAddress) -> BoxFuture<'static, io::Result<Transport>>;
}

impl<F> Dialer for F
where
    F: Fn(&NetworkAddress) -> BoxFuture<'static, io::Result<Transport>> + Send + Sync,
{
    fn dial(&self, addr: &NetworkAddress) -> BoxFuture<'static, io::Result<Transport>> {
        self(addr)
    }
}

/// Default dialer: TCP with keepalive enabled, or a Unix socket
#[derive(Debug, Clone)]
pub struct TcpDialer {
    keepalive: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self {
            keepalive: Some(DEFAULT_KEEPALIVE),
            connect_timeout: None,
        }
    }
}

impl TcpDialer {
    /// Create a dialer with the default 5 minute keepalive and no connect timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the keepalive idle interval, or `None` to leave keepalive off
    pub fn keepalive(mut self, idle: Option<Duration>) -> Self {
        self.keepalive = idle;
        self
    }

    /// Bound the time spent establishing the stream
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    async fn open(self, addr: NetworkAddress) -> io::Result<Transport> {
        match addr {
            NetworkAddress::Tcp(host_port) => {
                let stream = TcpStream::connect(host_port.as_str()).await?;
                if let Some(idle) = self.keepalive {
                    SockRef::from(&stream)
                        .set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
                }
                // Startup frames are small; don't let Nagle hold them back
                stream.set_nodelay(true)?;
                Ok(Transport::Tcp(stream))
            }
            NetworkAddress::Unix(path) => Ok(Transport::Unix(UnixStream::connect(path).await?)),
        }
    }
}

impl Dialer for TcpDialer {
    fn dial(&self, addr: &NetworkAddress) -> BoxFuture<'static, io::Result<Transport>> {
        let dialer = self.clone();
        let addr = addr.clone();
        Box::pin(async move {
            let timeout = dialer.connect_timeout;
            match timeout {
                Some(limit) => tokio::time::timeout(limit, dialer.open(addr))
                    .await
                    .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?,
                None => dialer.open(addr).await,
            }
        })
    }
}
