//! # mailwire-mime
//!
//! MIME message model and codecs for email.
//!
//! ## Features
//!
//! - **Message model**: messages as a tree of MIME parts with ordered,
//!   case-insensitive headers
//! - **Round-trip parsing**: parse and format whole RFC 5322 messages with
//!   multipart bodies, preserving structure
//! - **Addresses**: RFC 5322 address lists with display names, groups,
//!   quoted strings and comments
//! - **Codecs**: Base64, Quoted-Printable, 7bit/8bit/binary checks,
//!   RFC 2047 encoded words (any charset), RFC 2231 percent escapes,
//!   header folding and SMTP dot-stuffing
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_mime::{Address, Message};
//!
//! let mut msg = Message::new();
//! msg.from.addresses.push(Address::new("mailwire library", "mailwire@example.org"));
//! msg.to.addresses.push(Address::address_only("kaylee@example.org"));
//! msg.subject = "Hello, World!".to_string();
//! msg.content.set_text("A plain text body.");
//!
//! let wire = msg.format(&Default::default())?;
//! let parsed = Message::parse(&wire)?;
//! assert_eq!(parsed.subject, "Hello, World!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Address, Group, Mailboxes};
pub use content_type::ContentType;
pub use encoding::LinePolicy;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Disposition, FormatOptions, Message, Part, TransferEncoding};
