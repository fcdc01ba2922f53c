//! Line framing over a mail protocol stream.
//!
//! A [`Dialog`] frames the byte stream into CRLF-terminated lines and
//! exact-octet runs (IMAP literals). Reads go through an internal buffer
//! that never holds more than one excess line past the last delimiter;
//! writes are unbuffered. Every operation honors the optional per-call
//! timeout.

use std::time::Duration;

use bytes::BytesMut;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_rustls::TlsConnector;

use crate::{Error, MailStream, Result};

/// Default maximum accepted line length in octets.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

const READ_CHUNK: usize = 4096;

/// Buffered line-oriented channel over an async stream.
///
/// At most one read and one write may be in flight at a time; the
/// `&mut self` receivers make that structural. Clients sharing a dialog
/// across tasks serialize through [`crate::AsyncMutex`].
pub struct Dialog<S> {
    stream: S,
    buffer: BytesMut,
    max_line_length: usize,
    timeout: Option<Duration>,
}

impl<S> Dialog<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a dialog with the default line length cap and no timeout.
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, DEFAULT_MAX_LINE_LENGTH, None)
    }

    /// Creates a dialog with an explicit line length cap and timeout.
    pub fn with_limits(stream: S, max_line_length: usize, timeout: Option<Duration>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            max_line_length,
            timeout,
        }
    }

    /// Returns the configured maximum line length.
    #[must_use]
    pub const fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Sets the maximum line length.
    pub fn set_max_line_length(&mut self, value: usize) {
        self.max_line_length = value;
    }

    /// Returns the per-operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the per-operation timeout.
    pub fn set_timeout(&mut self, value: Option<Duration>) {
        self.timeout = value;
    }

    /// Returns true if undelivered plaintext bytes are buffered.
    #[must_use]
    pub fn has_buffered_input(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Sends one line, appending CRLF when missing.
    ///
    /// A bare trailing `\n` is replaced by `\r\n`; a line already ending
    /// in `\r\n` is written as-is. The write is not split across calls.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails or times out.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut payload = String::with_capacity(line.len() + 2);
        if let Some(stripped) = line.strip_suffix("\r\n") {
            payload.push_str(stripped);
        } else if let Some(stripped) = line.strip_suffix('\n') {
            payload.push_str(stripped);
        } else {
            payload.push_str(line);
        }
        payload.push_str("\r\n");

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, write_all(&mut self.stream, payload.as_bytes()))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => write_all(&mut self.stream, payload.as_bytes()).await,
        }
    }

    /// Writes a byte sequence verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails or times out.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, write_all(&mut self.stream, data))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => write_all(&mut self.stream, data).await,
        }
    }

    /// Reads the next line without its terminator.
    ///
    /// Strips a trailing `\r\n` or bare `\n`. Fails with
    /// [`Error::LineTooLong`] when no `\n` arrives within
    /// `max_line_length + 2` octets.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, truncated input or timeout.
    pub async fn read_line(&mut self) -> Result<String> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_line_inner())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_line_inner().await,
        }
    }

    async fn read_line_inner(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = memchr::memchr(b'\n', &self.buffer) {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                if line.len() > self.max_line_length {
                    return Err(Error::LineTooLong(self.max_line_length));
                }
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }

            if self.buffer.len() > self.max_line_length + 2 {
                return Err(Error::LineTooLong(self.max_line_length));
            }

            self.fill_buffer().await?;
        }
    }

    /// Reads exactly `n` octets, draining the buffer first.
    ///
    /// A zero-size read returns immediately without touching the stream.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, truncated input or timeout.
    pub async fn read_exactly(&mut self, n: usize) -> Result<Vec<u8>> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_exactly_inner(n))
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_exactly_inner(n).await,
        }
    }

    async fn read_exactly_inner(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.buffer.len() < n {
            self.fill_buffer().await?;
        }
        Ok(self.buffer.split_to(n).to_vec())
    }

    async fn fill_buffer(&mut self) -> Result<()> {
        self.buffer.reserve(READ_CHUNK);
        let n = self.stream.read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Ok(())
    }
}

async fn write_all<S>(stream: &mut S, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

impl Dialog<MailStream> {
    /// Returns true if the underlying stream is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Upgrades the underlying stream to TLS in place.
    ///
    /// # Errors
    ///
    /// Refused with [`Error::BufferedPlaintext`] when plaintext bytes are
    /// still buffered past the upgrade grant; otherwise fails as
    /// [`MailStream::start_tls`] does.
    pub async fn start_tls(
        &mut self,
        connector: &TlsConnector,
        server_name: ServerName<'static>,
    ) -> Result<()> {
        if self.has_buffered_input() {
            return Err(Error::BufferedPlaintext);
        }
        match self.timeout {
            Some(limit) => {
                tokio::time::timeout(limit, self.stream.start_tls(connector, server_name))
                    .await
                    .map_err(|_| Error::Timeout(limit))?
            }
            None => self.stream.start_tls(connector, server_name).await,
        }
    }

    /// Shuts down the underlying stream, ending a TLS session cleanly.
    ///
    /// # Errors
    ///
    /// Returns an error when the shutdown handshake fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mock = Builder::new().read(b"220 ready\r\n").build();
        let mut dialog = Dialog::new(mock);
        assert_eq!(dialog.read_line().await.unwrap(), "220 ready");
    }

    #[tokio::test]
    async fn read_line_strips_bare_lf() {
        let mock = Builder::new().read(b"220 ready\n").build();
        let mut dialog = Dialog::new(mock);
        assert_eq!(dialog.read_line().await.unwrap(), "220 ready");
    }

    #[tokio::test]
    async fn read_line_spans_chunks() {
        let mock = Builder::new().read(b"250 fi").read(b"rst\r\n250 second\r\n").build();
        let mut dialog = Dialog::new(mock);
        assert_eq!(dialog.read_line().await.unwrap(), "250 first");
        assert_eq!(dialog.read_line().await.unwrap(), "250 second");
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let line = "a".repeat(32);
        let wire = format!("{line}\r\n");
        let mock = Builder::new().read(wire.as_bytes()).build();
        let mut dialog = Dialog::with_limits(mock, 32, None);
        assert_eq!(dialog.read_line().await.unwrap(), line);
    }

    #[tokio::test]
    async fn line_over_limit_is_rejected() {
        let wire = format!("{}\r\n", "a".repeat(33));
        let mock = Builder::new().read(wire.as_bytes()).build();
        let mut dialog = Dialog::with_limits(mock, 32, None);
        assert!(matches!(
            dialog.read_line().await.unwrap_err(),
            Error::LineTooLong(32)
        ));
    }

    #[tokio::test]
    async fn unterminated_line_over_limit_is_rejected() {
        let wire = "a".repeat(64);
        let mock = Builder::new().read(wire.as_bytes()).build();
        let mut dialog = Dialog::with_limits(mock, 32, None);
        assert!(matches!(
            dialog.read_line().await.unwrap_err(),
            Error::LineTooLong(32)
        ));
    }

    #[tokio::test]
    async fn read_exactly_drains_buffer_first() {
        let mock = Builder::new().read(b"* literal {5}\r\nhello)\r\n").build();
        let mut dialog = Dialog::new(mock);
        assert_eq!(dialog.read_line().await.unwrap(), "* literal {5}");
        assert_eq!(dialog.read_exactly(5).await.unwrap(), b"hello");
        assert_eq!(dialog.read_line().await.unwrap(), ")");
    }

    #[tokio::test]
    async fn read_exactly_zero_reads_nothing() {
        let mock = Builder::new().read(b"next\r\n").build();
        let mut dialog = Dialog::new(mock);
        assert_eq!(dialog.read_exactly(0).await.unwrap(), Vec::<u8>::new());
        assert_eq!(dialog.read_line().await.unwrap(), "next");
    }

    #[tokio::test]
    async fn write_line_appends_crlf() {
        let mock = Builder::new().write(b"EHLO client\r\n").build();
        let mut dialog = Dialog::new(mock);
        dialog.write_line("EHLO client").await.unwrap();
    }

    #[tokio::test]
    async fn write_line_normalizes_bare_lf() {
        let mock = Builder::new().write(b"EHLO client\r\n").build();
        let mut dialog = Dialog::new(mock);
        dialog.write_line("EHLO client\n").await.unwrap();
    }

    #[tokio::test]
    async fn write_line_keeps_existing_crlf() {
        let mock = Builder::new().write(b"QUIT\r\n").build();
        let mut dialog = Dialog::new(mock);
        dialog.write_line("QUIT\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn write_raw_is_verbatim() {
        let mock = Builder::new().write(b"body\r\n.\r\n").build();
        let mut dialog = Dialog::new(mock);
        dialog.write_raw(b"body\r\n.\r\n").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn read_times_out() {
        let (near, _far) = tokio::io::duplex(64);
        let mut dialog =
            Dialog::with_limits(near, DEFAULT_MAX_LINE_LENGTH, Some(Duration::from_secs(2)));
        assert!(matches!(
            dialog.read_line().await.unwrap_err(),
            Error::Timeout(_)
        ));
    }

    #[tokio::test]
    async fn start_tls_refused_with_buffered_plaintext() {
        let (near, far) = tokio::io::duplex(256);
        let mut far = far;
        far.write_all(b"220 go ahead\r\nEHLO smuggled\r\n")
            .await
            .unwrap();

        let mut dialog = Dialog::new(MailStream::mem(near));
        assert_eq!(dialog.read_line().await.unwrap(), "220 go ahead");
        assert!(dialog.has_buffered_input());

        let connector = crate::TlsOptions::default().connector().unwrap();
        let name = ServerName::try_from("example.org".to_string()).unwrap();
        assert!(matches!(
            dialog.start_tls(&connector, name).await.unwrap_err(),
            Error::BufferedPlaintext
        ));
    }
}
