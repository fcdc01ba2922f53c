//! # mailwire-imap
//!
//! An asynchronous IMAP4rev1 client implementing the RFC 3501 subset
//! used for mail access: LOGIN, CAPABILITY, SELECT, FETCH, STORE,
//! SEARCH, CLOSE, LOGOUT and STARTTLS.
//!
//! ## Features
//!
//! - **Tagged command dispatch**: monotonically increasing numeric tags,
//!   untagged lines collected until the matching tagged reply
//! - **Response tokenizer**: atoms, quoted strings, nested parenthesized
//!   lists and octet-counted literals, with the bracketed response code
//!   in its own bucket
//! - **TLS**: implicit TLS (port 993) and STARTTLS over the same
//!   connection identity
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_imap::{Client, ImapOptions};
//!
//! let mut client = Client::new(ImapOptions::default());
//! client.connect("imap.example.org", 993).await?;
//! client.read_greeting().await?;
//! client.login("user@example.org", "password").await?;
//!
//! let stat = client.select("INBOX").await?;
//! println!("{} messages", stat.messages_no);
//!
//! let text = client.fetch(1, false).await?;
//! client.logout().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod tokenizer;
mod types;

pub use client::{Client, ImapOptions};
pub use error::{Error, Result};
pub use tokenizer::{ResponseTokenizer, Token};
pub use types::{
    format_imap_date, render_ranges, to_quoted, MailboxStat, MessagesRange, Response,
    ResponseLine, SearchCondition, Status, StoreAction,
};
