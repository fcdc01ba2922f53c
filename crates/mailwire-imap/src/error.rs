//! Error types for IMAP operations.

use crate::types::Status;

/// Result type alias for IMAP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// IMAP error types.
///
/// Errors carrying `details` hold the server's text, truncated to 512
/// characters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level error.
    #[error(transparent)]
    Net(#[from] mailwire_net::Error),

    /// Message parsing error.
    #[error(transparent)]
    Mime(#[from] mailwire_mime::Error),

    /// No connection has been established.
    #[error("Connection is not established")]
    NotConnected,

    /// The server greeting was BYE.
    #[error("Connection rejected: {details}")]
    ConnectRejected {
        /// Server text.
        details: String,
    },

    /// The tagged reply was NO or BAD.
    #[error("Server returned {status}: {details}")]
    Server {
        /// Tagged outcome.
        status: Status,
        /// Server text.
        details: String,
    },

    /// A response violated the IMAP grammar.
    #[error("Protocol parse failure: {details}")]
    Parse {
        /// What went wrong.
        details: String,
    },

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn parse(details: &str) -> Self {
        Self::Parse {
            details: mailwire_net::truncate_details(details),
        }
    }

    pub(crate) fn server(status: Status, details: &str) -> Self {
        Self::Server {
            status,
            details: mailwire_net::truncate_details(details),
        }
    }
}
