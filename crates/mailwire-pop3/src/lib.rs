//! # mailwire-pop3
//!
//! An asynchronous POP3 retrieval client implementing RFC 1939 with CAPA
//! (RFC 2449) and STLS (RFC 2595).
//!
//! ## Features
//!
//! - **Mailbox access**: STAT, LIST, UIDL, RETR, TOP, DELE, RSET, NOOP,
//!   QUIT with dot-unstuffed multi-line payloads
//! - **TLS**: implicit TLS (port 995) and STLS over the same connection
//!   identity
//! - **Authentication**: USER/PASS, gated by the cleartext-credentials
//!   policy
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_pop3::{Client, Pop3Options};
//!
//! let mut client = Client::new(Pop3Options::default());
//! client.connect("pop3.example.org", 995).await?;
//! client.read_greeting().await?;
//! client.login("user@example.org", "password").await?;
//!
//! let stat = client.stat().await?;
//! for n in 1..=stat.messages_no {
//!     let message = client.fetch(n).await?;
//!     println!("{}", message.subject);
//! }
//! client.quit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod types;

pub use client::{Client, Pop3Options};
pub use error::{Error, Result};
pub use types::MailboxStat;
