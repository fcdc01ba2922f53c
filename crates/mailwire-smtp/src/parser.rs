//! SMTP reply line parser.

use crate::error::{Error, Result};

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    /// Three-digit status code.
    pub status: u16,
    /// True when this line terminates the reply (space separator).
    pub last: bool,
    /// Text after the separator.
    pub text: String,
}

/// Parses a single reply line: three digits followed by `-` for a
/// continuation line or a space (or end of line) for the last line.
///
/// # Errors
///
/// Returns [`Error::Protocol`] when the line violates the grammar.
pub fn parse_reply_line(line: &str) -> Result<ReplyLine> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::protocol(line));
    }
    let status = u16::from(bytes[0] - b'0') * 100
        + u16::from(bytes[1] - b'0') * 10
        + u16::from(bytes[2] - b'0');

    let last = match bytes.get(3) {
        None => true,
        Some(b' ') => true,
        Some(b'-') => false,
        Some(_) => return Err(Error::protocol(line)),
    };
    let text = if line.len() > 4 {
        line[4..].to_string()
    } else {
        String::new()
    };
    Ok(ReplyLine { status, last, text })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_final_line() {
        let line = parse_reply_line("250 OK").unwrap();
        assert_eq!(line.status, 250);
        assert!(line.last);
        assert_eq!(line.text, "OK");
    }

    #[test]
    fn parses_continuation_line() {
        let line = parse_reply_line("250-AUTH LOGIN PLAIN").unwrap();
        assert_eq!(line.status, 250);
        assert!(!line.last);
        assert_eq!(line.text, "AUTH LOGIN PLAIN");
    }

    #[test]
    fn parses_bare_status() {
        let line = parse_reply_line("354").unwrap();
        assert_eq!(line.status, 354);
        assert!(line.last);
        assert_eq!(line.text, "");
    }

    #[test]
    fn rejects_short_line() {
        assert!(parse_reply_line("25").is_err());
    }

    #[test]
    fn rejects_non_numeric_status() {
        assert!(parse_reply_line("two hundred").is_err());
    }

    #[test]
    fn rejects_bad_separator() {
        assert!(parse_reply_line("250*oops").is_err());
    }
}
