//! SMTP command builder.

use std::fmt;

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - extended greeting.
    Ehlo {
        /// Client host name.
        domain: String,
    },
    /// HELO - fallback greeting.
    Helo {
        /// Client host name.
        domain: String,
    },
    /// STARTTLS - upgrade to TLS.
    StartTls,
    /// AUTH PLAIN with the initial response on the same line.
    AuthPlain {
        /// Base64 of `\0user\0pass`.
        initial: String,
    },
    /// AUTH LOGIN, credentials follow in 334 exchanges.
    AuthLogin,
    /// MAIL FROM - start a mail transaction.
    MailFrom {
        /// Envelope sender address.
        address: String,
    },
    /// RCPT TO - add a recipient.
    RcptTo {
        /// Envelope recipient address.
        address: String,
    },
    /// DATA - begin message data.
    Data,
    /// RSET - reset the transaction.
    Rset,
    /// NOOP - no operation.
    Noop,
    /// QUIT - close the connection.
    Quit,
    /// A raw line, used for base64 continuation responses.
    Raw(String),
}

impl Command {
    /// Serializes the command without its CRLF terminator.
    #[must_use]
    pub fn serialize(&self) -> String {
        match self {
            Self::Ehlo { domain } => format!("EHLO {domain}"),
            Self::Helo { domain } => format!("HELO {domain}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::AuthPlain { initial } => format!("AUTH PLAIN {initial}"),
            Self::AuthLogin => "AUTH LOGIN".to_string(),
            Self::MailFrom { address } => format!("MAIL FROM: <{address}>"),
            Self::RcptTo { address } => format!("RCPT TO: <{address}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Noop => "NOOP".to_string(),
            Self::Quit => "QUIT".to_string(),
            Self::Raw(line) => line.clone(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
