//! # mailwire-net
//!
//! Line-oriented network plumbing shared by the mailwire protocol clients.
//!
//! ## Features
//!
//! - **Upgradable stream**: [`MailStream`] holds either a plain TCP socket
//!   or a TLS session and can be upgraded in place with STARTTLS, so
//!   protocol clients keep a single stream identity across the upgrade
//! - **Dialog**: buffered CRLF line framing with exact-octet reads for
//!   IMAP literals, a line length cap and per-operation timeouts
//! - **Async mutex**: FIFO, cancel-safe lock for serializing commands on a
//!   shared connection
//! - **TLS configuration**: trust store selection, peer verification modes
//!   and SNI via rustls
//! - **Auth policy**: the cleartext-credentials gate applied before AUTH
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwire_net::{connect, Dialog, TlsOptions};
//!
//! let stream = connect("smtp.example.com", 587).await?;
//! let mut dialog = Dialog::new(stream);
//!
//! let greeting = dialog.read_line().await?;
//! dialog.write_line("EHLO client.example.org").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod auth;
mod dialog;
mod error;
mod mutex;
mod stream;
mod tls;

pub use auth::{ensure_auth_allowed, AuthOptions};
pub use dialog::{Dialog, DEFAULT_MAX_LINE_LENGTH};
pub use error::{truncate_details, Error, Result, MAX_ERROR_DETAILS};
pub use mutex::{AsyncMutex, LockFuture, MutexGuard};
pub use stream::{connect, connect_tls, MailStream};
pub use tls::{TlsMode, TlsOptions, VerifyMode};
