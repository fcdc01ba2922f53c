//! Error types for POP3 operations.

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
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

    /// The server greeting was not `+OK`.
    #[error("Connection rejected: {details}")]
    ConnectRejected {
        /// Server text.
        details: String,
    },

    /// The server replied `-ERR`.
    #[error("Server error: {details}")]
    Server {
        /// Server text.
        details: String,
    },

    /// A reply used neither `+OK` nor `-ERR`.
    #[error("Protocol parse failure: {details}")]
    Protocol {
        /// Offending line.
        details: String,
    },

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An argument violated a documented requirement.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub(crate) fn server(details: &str) -> Self {
        Self::Server {
            details: mailwire_net::truncate_details(details),
        }
    }

    pub(crate) fn protocol(details: &str) -> Self {
        Self::Protocol {
            details: mailwire_net::truncate_details(details),
        }
    }
}
