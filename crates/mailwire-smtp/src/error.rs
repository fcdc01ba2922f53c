//! Error types for SMTP operations.

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Errors carrying `details` hold the server's last line, truncated to
/// 512 characters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level error.
    #[error(transparent)]
    Net(#[from] mailwire_net::Error),

    /// Message formatting error.
    #[error(transparent)]
    Mime(#[from] mailwire_mime::Error),

    /// No connection has been established.
    #[error("Connection is not established")]
    NotConnected,

    /// The server greeting was not 220.
    #[error("Connection rejected: {details}")]
    ConnectRejected {
        /// Server text.
        details: String,
    },

    /// The server refused a command.
    #[error("Command rejected with {status}: {details}")]
    Rejected {
        /// Three-digit reply status.
        status: u16,
        /// Server text.
        details: String,
    },

    /// Authentication was refused by the server.
    #[error("Authentication rejected: {details}")]
    AuthRejected {
        /// Server text.
        details: String,
    },

    /// A reply violated the SMTP grammar.
    #[error("Protocol parse failure: {details}")]
    Protocol {
        /// Offending line.
        details: String,
    },

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No envelope sender could be derived from the message.
    #[error("Mail sender is missing")]
    NoSender,

    /// No recipients could be derived from the message.
    #[error("No recipients")]
    NoRecipients,
}

impl Error {
    pub(crate) fn rejected(status: u16, details: &str) -> Self {
        Self::Rejected {
            status,
            details: mailwire_net::truncate_details(details),
        }
    }

    pub(crate) fn protocol(details: &str) -> Self {
        Self::Protocol {
            details: mailwire_net::truncate_details(details),
        }
    }
}
