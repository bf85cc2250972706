//! Frame channel: a transport paired with the wire codec

use super::transport::Transport;
use crate::protocol::{decode_message, encode_message, BackendMessage, FrontendMessage};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Bidirectional message channel over a byte stream
#[derive(Debug)]
pub struct MessageChannel {
    transport: Transport,
    read_buf: BytesMut,
}

impl MessageChannel {
    /// Wrap a transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            read_buf: BytesMut::with_capacity(8192),
        }
    }

    /// Encode and write one frame, then flush
    pub async fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        let buf = encode_message(msg).map_err(|e| Error::Protocol(e.to_string()))?;
        self.transport.write_all(&buf).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Wait for one complete backend frame
    pub async fn recv(&mut self) -> Result<BackendMessage> {
        loop {
            if let Some((msg, consumed)) = decode_message(&self.read_buf)
                .map_err(|e| Error::Protocol(e.to_string()))?
            {
                self.read_buf.advance(consumed);
                return Ok(msg);
            }

            let n = self.transport.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Read exactly one raw byte, bypassing the frame codec.
    ///
    /// Only valid before any frame has been received (the SSLRequest reply).
    pub async fn read_byte(&mut self) -> Result<u8> {
        if self.read_buf.has_remaining() {
            return Ok(self.read_buf.get_u8());
        }
        match self.transport.read_u8().await {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
            Err(e) => Err(e.into()),
        }
    }

    /// Shared access to the transport
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Give up the transport (and any unread bytes)
    pub fn into_transport(self) -> Transport {
        self.transport
    }

    /// Shut down the write half of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transport.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_recv_reassembles_split_frames() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut channel = MessageChannel::new(Transport::custom(client));

        tokio::spawn(async move {
            server.write_all(&[b'Z', 0, 0]).await.unwrap();
            server.flush().await.unwrap();
            tokio::task::yield_now().await;
            server.write_all(&[0, 5, b'T']).await.unwrap();
        });

        let msg = channel.recv().await.unwrap();
        assert_eq!(msg, BackendMessage::ReadyForQuery { status: b'T' });
    }

    #[tokio::test]
    async fn test_recv_two_frames_in_one_read() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut channel = MessageChannel::new(Transport::custom(client));

        server
            .write_all(&[b'Z', 0, 0, 0, 5, b'I', b'Z', 0, 0, 0, 5, b'E'])
            .await
            .unwrap();

        assert_eq!(
            channel.recv().await.unwrap(),
            BackendMessage::ReadyForQuery { status: b'I' }
        );
        assert_eq!(
            channel.recv().await.unwrap(),
            BackendMessage::ReadyForQuery { status: b'E' }
        );
    }

    #[tokio::test]
    async fn test_recv_eof_is_connection_closed() {
        let (client, server) = tokio::io::duplex(64);
        let mut channel = MessageChannel::new(Transport::custom(client));
        drop(server);

        assert!(matches!(channel.recv().await, Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_recv_malformed_frame_is_protocol_error() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut channel = MessageChannel::new(Transport::custom(client));
        server.write_all(&[b'Z', 0, 0, 0, 1]).await.unwrap();

        assert!(matches!(channel.recv().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_send_writes_encoded_frame() {
        let mock = tokio_test::io::Builder::new()
            .write(&[b'X', 0, 0, 0, 4])
            .build();
        let mut channel = MessageChannel::new(Transport::custom(mock));

        channel.send(&FrontendMessage::Terminate).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_unencodable_frame_is_protocol_error() {
        // No write is scripted: the frame must be rejected before any I/O
        let mock = tokio_test::io::Builder::new().build();
        let mut channel = MessageChannel::new(Transport::custom(mock));

        let err = channel
            .send(&FrontendMessage::Password("pass\0word".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_read_byte() {
        let mock = tokio_test::io::Builder::new().read(b"S").build();
        let mut channel = MessageChannel::new(Transport::custom(mock));

        assert_eq!(channel.read_byte().await.unwrap(), b'S');
    }

    #[tokio::test]
    async fn test_read_byte_consumes_exactly_one_byte() {
        // The reply byte and a following frame arrive in one segment
        let mock = tokio_test::io::Builder::new()
            .read(&[b'S', b'Z', 0, 0, 0, 5, b'I'])
            .build();
        let mut channel = MessageChannel::new(Transport::custom(mock));

        assert_eq!(channel.read_byte().await.unwrap(), b'S');
        assert!(channel.read_buf.is_empty());

        // Everything after the reply byte is still on the transport
        assert_eq!(
            channel.recv().await.unwrap(),
            BackendMessage::ReadyForQuery { status: b'I' }
        );
    }
}
