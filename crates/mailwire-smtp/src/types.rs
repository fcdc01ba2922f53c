//! Core SMTP types: replies, capabilities, envelopes.

use std::collections::BTreeMap;

/// SMTP reply: a three-digit status and the text of every reply line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit status shared by all lines of the reply.
    pub status: u16,
    /// Text after the status code, one entry per line.
    pub lines: Vec<String>,
}

impl Reply {
    /// Returns true for a positive completion reply (2xx).
    #[must_use]
    pub const fn is_positive_completion(&self) -> bool {
        self.status / 100 == 2
    }

    /// Returns true for a positive intermediate reply (3xx).
    #[must_use]
    pub const fn is_positive_intermediate(&self) -> bool {
        self.status / 100 == 3
    }

    /// Returns true for a transient negative reply (4xx).
    #[must_use]
    pub const fn is_transient_negative(&self) -> bool {
        self.status / 100 == 4
    }

    /// Returns true for a permanent negative reply (5xx).
    #[must_use]
    pub const fn is_permanent_negative(&self) -> bool {
        self.status / 100 == 5
    }

    /// Returns the reply text with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }
}

/// Server capabilities advertised by EHLO.
///
/// Keys are the uppercased first token of each capability line; the
/// remaining tokens are the parameters.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    entries: BTreeMap<String, Vec<String>>,
}

impl Capabilities {
    /// Parses capabilities from an EHLO reply. The first line is the
    /// server greeting and carries no capability.
    #[must_use]
    pub fn parse(reply: &Reply) -> Self {
        let mut capabilities = Self::default();
        for line in reply.lines.iter().skip(1) {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let entry = capabilities
                .entries
                .entry(key.to_ascii_uppercase())
                .or_default();
            entry.extend(tokens.map(String::from));
        }
        capabilities
    }

    /// Returns true when no capability was advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks for a capability, case-insensitively.
    #[must_use]
    pub fn supports(&self, capability: &str) -> bool {
        self.entries.contains_key(&capability.to_ascii_uppercase())
    }

    /// Returns the parameters of a capability, if advertised.
    #[must_use]
    pub fn parameters(&self, capability: &str) -> Option<&[String]> {
        self.entries
            .get(&capability.to_ascii_uppercase())
            .map(Vec::as_slice)
    }

    /// Forgets every capability (after HELO fallback or STARTTLS).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Explicit SMTP envelope overriding the message headers.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// MAIL FROM address; empty falls back to Sender then From.
    pub mail_from: String,
    /// RCPT TO addresses; empty falls back to To, Cc and Bcc.
    pub rcpt_to: Vec<String>,
}

/// Supported authentication mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// SASL PLAIN (RFC 4616).
    Plain,
    /// The de-facto AUTH LOGIN exchange.
    Login,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reply_classification() {
        let ok = Reply {
            status: 250,
            lines: vec!["OK".to_string()],
        };
        assert!(ok.is_positive_completion());
        assert!(!ok.is_positive_intermediate());

        let data = Reply {
            status: 354,
            lines: vec![],
        };
        assert!(data.is_positive_intermediate());

        let busy = Reply {
            status: 450,
            lines: vec![],
        };
        assert!(busy.is_transient_negative());

        let denied = Reply {
            status: 550,
            lines: vec![],
        };
        assert!(denied.is_permanent_negative());
    }

    #[test]
    fn reply_message_joins_lines() {
        let reply = Reply {
            status: 220,
            lines: vec!["one".to_string(), "two".to_string()],
        };
        assert_eq!(reply.message(), "one\ntwo");
    }

    #[test]
    fn capabilities_skip_greeting_line() {
        let reply = Reply {
            status: 250,
            lines: vec![
                "smtp.example.org".to_string(),
                "AUTH LOGIN PLAIN".to_string(),
                "STARTTLS".to_string(),
                "8BITMIME".to_string(),
            ],
        };
        let capabilities = Capabilities::parse(&reply);
        assert!(capabilities.supports("AUTH"));
        assert!(capabilities.supports("starttls"));
        assert!(capabilities.supports("8BITMIME"));
        assert!(!capabilities.supports("SMTP.EXAMPLE.ORG"));
        assert_eq!(
            capabilities.parameters("AUTH").unwrap(),
            &["LOGIN".to_string(), "PLAIN".to_string()]
        );
        assert_eq!(capabilities.parameters("STARTTLS").unwrap(), &[] as &[String]);
    }

    #[test]
    fn capabilities_clear() {
        let reply = Reply {
            status: 250,
            lines: vec!["greeting".to_string(), "SIZE 35882577".to_string()],
        };
        let mut capabilities = Capabilities::parse(&reply);
        assert!(capabilities.supports("SIZE"));
        capabilities.clear();
        assert!(capabilities.is_empty());
    }
}
