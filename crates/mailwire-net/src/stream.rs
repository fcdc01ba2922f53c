//! Stream types for mail protocol connections.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::{Error, Result};

/// A stream that is either plaintext or TLS, upgradable in place.
///
/// Protocol clients hold this single type across a STARTTLS upgrade, so
/// the connection identity never changes. The plain-to-TLS transition is
/// one-way; a failed handshake leaves the stream poisoned and every
/// subsequent operation fails.
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
    /// A failed or cancelled upgrade left the stream unusable.
    Poisoned,
    /// In-memory stream for scripted tests.
    #[cfg(any(test, feature = "test-util"))]
    Mem(tokio::io::DuplexStream),
}

impl MailStream {
    /// Creates a new plaintext stream.
    #[must_use]
    pub const fn plain(stream: TcpStream) -> Self {
        Self::Plain(stream)
    }

    /// Creates a new TLS stream.
    #[must_use]
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        Self::Tls(Box::new(stream))
    }

    /// Creates a stream over an in-memory duplex pipe.
    #[cfg(any(test, feature = "test-util"))]
    #[must_use]
    pub const fn mem(stream: tokio::io::DuplexStream) -> Self {
        Self::Mem(stream)
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns true if a failed upgrade poisoned the stream.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        matches!(self, Self::Poisoned)
    }

    /// Upgrades the stream from plaintext to TLS in place.
    ///
    /// The server name carries the SNI sent during the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the stream is already TLS or was
    /// poisoned, and [`Error::TlsHandshake`] if the handshake fails; in the
    /// latter case the stream is left poisoned.
    pub async fn start_tls(
        &mut self,
        connector: &TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<()> {
        match std::mem::replace(self, Self::Poisoned) {
            Self::Plain(tcp) => match connector.connect(server_name, tcp).await {
                Ok(tls) => {
                    *self = Self::Tls(Box::new(tls));
                    Ok(())
                }
                Err(err) => Err(Error::TlsHandshake(err)),
            },
            Self::Poisoned => Err(Error::InvalidState("stream is poisoned".to_string())),
            other @ Self::Tls(_) => {
                *self = other;
                Err(Error::InvalidState("stream is already TLS".to_string()))
            }
            #[cfg(any(test, feature = "test-util"))]
            other @ Self::Mem(_) => {
                *self = other;
                Err(Error::InvalidState(
                    "in-memory stream cannot be upgraded".to_string(),
                ))
            }
        }
    }
}

fn poisoned_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream is poisoned")
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Poisoned => Poll::Ready(Err(poisoned_error())),
            #[cfg(any(test, feature = "test-util"))]
            Self::Mem(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Poisoned => Poll::Ready(Err(poisoned_error())),
            #[cfg(any(test, feature = "test-util"))]
            Self::Mem(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
            Self::Poisoned => Poll::Ready(Err(poisoned_error())),
            #[cfg(any(test, feature = "test-util"))]
            Self::Mem(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Poisoned => Poll::Ready(Err(poisoned_error())),
            #[cfg(any(test, feature = "test-util"))]
            Self::Mem(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects to a server over plain TCP.
///
/// # Errors
///
/// Returns [`Error::ConnectFailed`] if resolution or the connection fails.
pub async fn connect(host: &str, port: u16) -> Result<MailStream> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(Error::ConnectFailed)?;
    Ok(MailStream::Plain(tcp))
}

/// Connects to a server with implicit TLS (handshake right after connect).
///
/// # Errors
///
/// Returns [`Error::ConnectFailed`] if the connection fails and
/// [`Error::TlsHandshake`] if the handshake fails.
pub async fn connect_tls(
    host: &str,
    port: u16,
    connector: &TlsConnector,
    server_name: ServerName<'static>,
) -> Result<MailStream> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(Error::ConnectFailed)?;
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(Error::TlsHandshake)?;
    Ok(MailStream::Tls(Box::new(tls)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn mem_stream_round_trip() {
        let (near, far) = tokio::io::duplex(64);
        let mut stream = MailStream::mem(near);
        let mut far = far;

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn poisoned_stream_fails_io() {
        let mut stream = MailStream::Poisoned;
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).await.is_err());
        assert!(stream.write_all(b"x").await.is_err());
    }

    #[tokio::test]
    async fn mem_stream_refuses_upgrade() {
        let (near, _far) = tokio::io::duplex(64);
        let mut stream = MailStream::mem(near);
        let connector = crate::TlsOptions::default().connector().unwrap();
        let name = ServerName::try_from("example.org".to_string()).unwrap();
        let err = stream.start_tls(&connector, name).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(!stream.is_poisoned());
    }
}
