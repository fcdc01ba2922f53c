//! # mailwire-smtp
//!
//! An asynchronous SMTP submission client implementing RFC 5321.
//!
//! ## Features
//!
//! - **Full submission support**: EHLO with HELO fallback, MAIL FROM,
//!   RCPT TO, DATA with dot-stuffing, NOOP/RSET/QUIT
//! - **TLS**: implicit TLS (port 465) and STARTTLS over the same
//!   connection identity, with optional opportunistic upgrade
//! - **Authentication**: AUTH PLAIN and AUTH LOGIN, gated by the
//!   cleartext-credentials policy
//! - **Capability tracking**: EHLO keywords with parameters
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_mime::{Address, Message};
//! use mailwire_smtp::{AuthMethod, Client, SmtpOptions};
//!
//! let mut client = Client::new(SmtpOptions::default());
//! client.connect("smtp.example.org", 587).await?;
//! client.read_greeting().await?;
//! client.ehlo(None).await?;
//! client.authenticate("user@example.org", "password", AuthMethod::Plain).await?;
//!
//! let mut msg = Message::new();
//! msg.from.addresses.push(Address::address_only("user@example.org"));
//! msg.to.addresses.push(Address::address_only("peer@example.org"));
//! msg.subject = "Hello".to_string();
//! msg.content.set_text("Hello over SMTP.");
//! client.send(&msg, None).await?;
//! client.quit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod command;
mod error;
mod parser;
mod types;

pub use client::{Client, SmtpOptions};
pub use command::Command;
pub use error::{Error, Result};
pub use parser::{parse_reply_line, ReplyLine};
pub use types::{AuthMethod, Capabilities, Envelope, Reply};
