//! Transport abstraction (TCP, Unix socket, TLS, or a caller-supplied stream)

use crate::Result;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};

/// Any ordered, reliable duplex byte stream usable as a transport
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Owned byte stream to the server
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Tcp(TcpStream),
    /// Unix domain socket
    Unix(UnixStream),
    /// TLS session layered over another transport
    Tls(Box<tokio_rustls::client::TlsStream<Transport>>),
    /// Stream produced by a custom dialer
    Custom(Box<dyn AsyncStream>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tcp(_) => f.write_str("Transport::Tcp(TcpStream)"),
            Transport::Unix(_) => f.write_str("Transport::Unix(UnixStream)"),
            Transport::Tls(stream) => {
                write!(f, "Transport::Tls({:?})", stream.get_ref().0)
            }
            Transport::Custom(_) => f.write_str("Transport::Custom(..)"),
        }
    }
}

impl Transport {
    /// Wrap any duplex stream
    pub fn custom<S: AsyncStream + 'static>(stream: S) -> Self {
        Transport::Custom(Box::new(stream))
    }

    /// Whether the transport is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Upgrade the transport to TLS after a successful SSLRequest exchange.
    ///
    /// Consumes `self` and returns a new `Transport` with a TLS-encrypted stream.
    /// Returns an error if the transport is already encrypted.
    pub async fn upgrade_to_tls(
        self,
        tls_config: &crate::connection::TlsConfig,
        hostname: &str,
    ) -> Result<Self> {
        if self.is_tls() {
            return Err(crate::Error::Config(
                "transport is already TLS-encrypted".into(),
            ));
        }

        let server_name = tls_config.server_name_for(hostname)?;
        let connector = tokio_rustls::TlsConnector::from(tls_config.client_config());
        let tls_stream = connector.connect(server_name, self).await?;

        Ok(Transport::Tls(Box::new(tls_stream)))
    }
}

impl From<TcpStream> for Transport {
    fn from(stream: TcpStream) -> Self {
        Transport::Tcp(stream)
    }
}

impl From<UnixStream> for Transport {
    fn from(stream: UnixStream) -> Self {
        Transport::Unix(stream)
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
            Transport::Custom(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
            Transport::Custom(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Unix(stream) => Pin::new(stream).poll_flush(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
            Transport::Custom(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            Transport::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
            Transport::Custom(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_custom_transport_round_trip() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut transport = Transport::custom(client);

        transport.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        transport.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_debug_does_not_expose_stream() {
        let (client, _server) = tokio::io::duplex(8);
        let transport = Transport::custom(client);
        assert_eq!(format!("{:?}", transport), "Transport::Custom(..)");
        assert!(!transport.is_tls());
    }
}
