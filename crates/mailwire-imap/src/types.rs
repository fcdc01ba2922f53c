//! Core IMAP types: statuses, responses, ranges, search conditions.

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::tokenizer::Token;

/// Outcome atom of a response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed.
    Ok,
    /// Command failed.
    No,
    /// Command was malformed.
    Bad,
    /// Greeting of a pre-authenticated connection (untagged only).
    Preauth,
    /// Server is closing the connection (untagged only).
    Bye,
}

impl Status {
    /// Parses a status atom, case-insensitively.
    #[must_use]
    pub fn parse(atom: &str) -> Option<Self> {
        if atom.eq_ignore_ascii_case("OK") {
            Some(Self::Ok)
        } else if atom.eq_ignore_ascii_case("NO") {
            Some(Self::No)
        } else if atom.eq_ignore_ascii_case("BAD") {
            Some(Self::Bad)
        } else if atom.eq_ignore_ascii_case("PREAUTH") {
            Some(Self::Preauth)
        } else if atom.eq_ignore_ascii_case("BYE") {
            Some(Self::Bye)
        } else {
            None
        }
    }

    /// Returns true for the outcomes a tagged reply may carry.
    #[must_use]
    pub const fn is_tagged(self) -> bool {
        matches!(self, Self::Ok | Self::No | Self::Bad)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::Preauth => "PREAUTH",
            Self::Bye => "BYE",
        };
        f.write_str(text)
    }
}

/// One logical response line with its tokens.
#[derive(Debug, Clone, Default)]
pub struct ResponseLine {
    /// Physical line fragments, literal continuations included.
    pub fragments: Vec<String>,
    /// Literal payloads, in order of appearance.
    pub literals: Vec<Vec<u8>>,
    /// Tokens of the mandatory part.
    pub mandatory: Vec<Token>,
    /// Tokens of the bracketed response code, when present.
    pub optional: Vec<Token>,
}

/// A complete command response: untagged lines plus the tagged one.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command tag; empty for the greeting.
    pub tag: String,
    /// Outcome of the tagged line.
    pub status: Status,
    /// Text after the status atom of the tagged line.
    pub text: String,
    /// Every line of the response, the tagged line last.
    pub lines: Vec<ResponseLine>,
}

/// Mailbox statistics gathered from a SELECT response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxStat {
    /// Number of messages in the mailbox.
    pub messages_no: u64,
    /// Number of messages with the Recent flag.
    pub recent_messages_no: u64,
    /// Predicted next UID.
    pub uid_next: u64,
    /// UID validity value.
    pub uid_validity: u64,
    /// Number of the first unseen message.
    pub unseen_messages_no: u64,
}

/// An inclusive message range; an open end renders as `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagesRange {
    /// First message number.
    pub start: u32,
    /// Last message number, or `None` for `*`.
    pub end: Option<u32>,
}

impl MessagesRange {
    /// A range of one message, rendered as a bare number.
    #[must_use]
    pub const fn single(number: u32) -> Self {
        Self {
            start: number,
            end: Some(number),
        }
    }

    /// A closed range `start:end`.
    #[must_use]
    pub const fn range(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// An open range `start:*`.
    #[must_use]
    pub const fn starting_at(start: u32) -> Self {
        Self { start, end: None }
    }
}

impl fmt::Display for MessagesRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}:{end}", self.start),
            None => write!(f, "{}:*", self.start),
        }
    }
}

/// Renders ranges joined with commas, as a sequence set.
#[must_use]
pub fn render_ranges(ranges: &[MessagesRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Flag update mode for STORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS` - add the listed flags.
    Add,
    /// `-FLAGS` - remove the listed flags.
    Remove,
    /// `FLAGS` - replace the flags.
    Set,
}

/// One SEARCH key; conditions form a flat AND sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCondition {
    /// Every message.
    All,
    /// Messages in the given sequence ranges.
    SequenceSet(Vec<MessagesRange>),
    /// Messages in the given UID ranges.
    UidSet(Vec<MessagesRange>),
    /// Subject contains the string.
    Subject(String),
    /// Body contains the string.
    Body(String),
    /// From contains the string.
    From(String),
    /// To contains the string.
    To(String),
    /// Internal date before the day.
    Before(NaiveDate),
    /// Internal date on the day.
    On(NaiveDate),
    /// Internal date on or after the day.
    Since(NaiveDate),
    /// Recent and unseen messages.
    New,
    /// Messages with the Recent flag.
    Recent,
    /// Messages with the Seen flag.
    Seen,
    /// Messages without the Seen flag.
    Unseen,
}

impl SearchCondition {
    /// Renders the condition as its IMAP search key.
    #[must_use]
    pub fn to_imap_string(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::SequenceSet(ranges) => render_ranges(ranges),
            Self::UidSet(ranges) => format!("UID {}", render_ranges(ranges)),
            Self::Subject(text) => format!("SUBJECT {}", to_quoted(text)),
            Self::Body(text) => format!("BODY {}", to_quoted(text)),
            Self::From(text) => format!("FROM {}", to_quoted(text)),
            Self::To(text) => format!("TO {}", to_quoted(text)),
            Self::Before(date) => format!("BEFORE {}", format_imap_date(*date)),
            Self::On(date) => format!("ON {}", format_imap_date(*date)),
            Self::Since(date) => format!("SINCE {}", format_imap_date(*date)),
            Self::New => "NEW".to_string(),
            Self::Recent => "RECENT".to_string(),
            Self::Seen => "SEEN".to_string(),
            Self::Unseen => "UNSEEN".to_string(),
        }
    }
}

/// Quotes a string argument, escaping backslashes and double quotes.
#[must_use]
pub fn to_quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Renders a date as `dd-Mon-yyyy` with the invariant English month
/// abbreviation.
#[must_use]
pub fn format_imap_date(date: NaiveDate) -> String {
    format!(
        "{:02}-{}-{}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}
