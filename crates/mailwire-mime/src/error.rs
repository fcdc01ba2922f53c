//! Error types for MIME operations.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed header line.
    #[error("Invalid MIME header: {0}")]
    InvalidHeader(String),

    /// Malformed or missing multipart boundary.
    #[error("Invalid multipart boundary: {0}")]
    InvalidBoundary(String),

    /// Malformed content transfer encoding payload.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Malformed address list.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Line exceeded the active line length policy.
    #[error("Line longer than {0} characters")]
    LineTooLong(usize),

    /// Unknown or undecodable character set.
    #[error("Charset conversion failure: {0}")]
    Charset(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] FromUtf8Error),
}
