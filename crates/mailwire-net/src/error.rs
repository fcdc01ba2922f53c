//! Error types for network operations.

use std::io;
use std::time::Duration;

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Network layer error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connecting the TCP socket failed.
    #[error("Connection failed: {0}")]
    ConnectFailed(io::Error),

    /// The TLS handshake failed; the stream is poisoned.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(io::Error),

    /// Operation exceeded the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Received line exceeded the configured maximum length.
    #[error("Line longer than {0} octets")]
    LineTooLong(usize),

    /// STARTTLS was requested while plaintext bytes were still buffered.
    ///
    /// Bytes pipelined past the upgrade grant are a command injection
    /// vector, so the upgrade is refused outright.
    #[error("Refusing TLS upgrade: plaintext bytes buffered past the upgrade grant")]
    BufferedPlaintext,

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Authentication over cleartext was denied by policy.
    #[error("TLS required for authentication; upgrade the connection or allow cleartext auth")]
    AuthForbidden,
}

impl Error {
    /// Returns true if the underlying connection should be considered dead.
    #[must_use]
    pub const fn is_connection_dead(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectFailed(_) | Self::TlsHandshake(_) | Self::Timeout(_)
        )
    }
}

/// Longest server text carried in an error's details.
pub const MAX_ERROR_DETAILS: usize = 512;

/// Truncates server text for inclusion in an error, respecting UTF-8
/// boundaries.
#[must_use]
pub fn truncate_details(text: &str) -> String {
    if text.len() <= MAX_ERROR_DETAILS {
        return text.to_string();
    }
    let mut end = MAX_ERROR_DETAILS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
