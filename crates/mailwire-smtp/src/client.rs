//! The SMTP submission client.

use std::collections::HashSet;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mailwire_mime::{FormatOptions, Message};
use mailwire_net::{
    connect, connect_tls, ensure_auth_allowed, AuthOptions, Dialog, MailStream, TlsMode,
    TlsOptions, DEFAULT_MAX_LINE_LENGTH,
};
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::parse_reply_line;
use crate::types::{AuthMethod, Capabilities, Envelope, Reply};

/// SMTP client options.
#[derive(Debug, Clone)]
pub struct SmtpOptions {
    /// TLS trust store and verification options.
    pub tls: TlsOptions,
    /// How the connection negotiates TLS.
    pub tls_mode: TlsMode,
    /// Upgrade opportunistically after EHLO when the server advertises
    /// STARTTLS (only in [`TlsMode::StartTls`]).
    pub auto_starttls: bool,
    /// Cleartext-credentials policy.
    pub auth: AuthOptions,
    /// Maximum accepted reply line length.
    pub max_line_length: usize,
    /// Per-operation I/O timeout.
    pub timeout: Option<Duration>,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            tls: TlsOptions::default(),
            tls_mode: TlsMode::StartTls,
            auto_starttls: true,
            auth: AuthOptions::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Asynchronous SMTP client.
///
/// The client owns a dialog over a single upgradable stream; STARTTLS
/// changes the transport without changing the connection identity.
pub struct Client {
    dialog: Option<Dialog<MailStream>>,
    host: String,
    local_hostname: String,
    connector: Option<TlsConnector>,
    capabilities: Capabilities,
    options: SmtpOptions,
}

impl Client {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(options: SmtpOptions) -> Self {
        Self {
            dialog: None,
            host: String::new(),
            local_hostname: default_hostname(),
            connector: None,
            capabilities: Capabilities::default(),
            options,
        }
    }

    /// Creates a client over an already-established stream.
    #[must_use]
    pub fn from_stream(stream: MailStream, options: SmtpOptions) -> Self {
        let mut client = Self::new(options);
        client.install_stream(stream);
        client
    }

    /// Connects to the server, handshaking TLS immediately in
    /// [`TlsMode::Implicit`].
    ///
    /// # Errors
    ///
    /// Returns an error when resolution, connection or the handshake
    /// fails.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.host = host.to_string();
        let stream = match self.options.tls_mode {
            TlsMode::Implicit => {
                let connector = self.connector()?;
                let name = server_name(host)?;
                connect_tls(host, port, &connector, name).await?
            }
            TlsMode::None | TlsMode::StartTls => connect(host, port).await?,
        };
        self.install_stream(stream);
        Ok(())
    }

    /// Returns true when the connection is TLS-encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.dialog.as_ref().is_some_and(Dialog::is_tls)
    }

    /// Returns the capabilities parsed from the last EHLO reply.
    #[must_use]
    pub const fn server_capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Reads the server greeting, expecting status 220.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectRejected`] on any other status.
    pub async fn read_greeting(&mut self) -> Result<Reply> {
        let reply = self.read_reply().await?;
        if reply.status != 220 {
            return Err(Error::ConnectRejected {
                details: mailwire_net::truncate_details(&reply.message()),
            });
        }
        Ok(reply)
    }

    /// Sends EHLO, falling back to HELO when the server refuses it.
    ///
    /// On EHLO success the advertised capabilities are stored; the HELO
    /// fallback clears them. With `auto_starttls` enabled the connection
    /// is upgraded and EHLO re-issued when the server advertises
    /// STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns an error when both greetings are refused or the upgrade
    /// fails.
    pub async fn ehlo(&mut self, domain: Option<&str>) -> Result<Reply> {
        let helo_name = domain.unwrap_or(&self.local_hostname).to_string();
        let mut reply = self
            .command(Command::Ehlo {
                domain: helo_name.clone(),
            })
            .await?;
        if !reply.is_positive_completion() {
            reply = self
                .command(Command::Helo {
                    domain: helo_name.clone(),
                })
                .await?;
            if !reply.is_positive_completion() {
                return Err(Error::rejected(reply.status, &reply.message()));
            }
            self.capabilities.clear();
            return Ok(reply);
        }
        self.capabilities = Capabilities::parse(&reply);

        if self.options.auto_starttls
            && self.options.tls_mode == TlsMode::StartTls
            && !self.is_tls()
            && self.capabilities.supports("STARTTLS")
        {
            self.start_tls(None).await?;
            reply = self
                .command(Command::Ehlo { domain: helo_name })
                .await?;
            if !reply.is_positive_completion() {
                return Err(Error::rejected(reply.status, &reply.message()));
            }
            self.capabilities = Capabilities::parse(&reply);
        }
        Ok(reply)
    }

    /// Upgrades the connection with STARTTLS.
    ///
    /// SNI defaults to the connect host. Capabilities are cleared; the
    /// caller must re-issue EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is already TLS, the server
    /// refuses the upgrade, or the handshake fails.
    pub async fn start_tls(&mut self, sni: Option<&str>) -> Result<()> {
        if self.is_tls() {
            return Err(Error::InvalidState("connection is already TLS".to_string()));
        }
        let reply = self.command(Command::StartTls).await?;
        if reply.status != 220 {
            return Err(Error::rejected(reply.status, &reply.message()));
        }
        let name = server_name(sni.unwrap_or(&self.host))?;
        let connector = self.connector()?;
        self.dialog_mut()?.start_tls(&connector, name).await?;
        self.capabilities.clear();
        tracing::debug!(host = %self.host, "connection upgraded to TLS");
        Ok(())
    }

    /// Authenticates with the given mechanism.
    ///
    /// # Errors
    ///
    /// Returns [`mailwire_net::Error::AuthForbidden`] (wrapped) when the
    /// cleartext policy denies the attempt, and [`Error::AuthRejected`]
    /// when the server refuses the credentials.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        method: AuthMethod,
    ) -> Result<()> {
        ensure_auth_allowed(self.is_tls(), &self.options.auth)?;
        match method {
            AuthMethod::Plain => self.authenticate_plain(username, password).await,
            AuthMethod::Login => self.authenticate_login(username, password).await,
        }
    }

    async fn authenticate_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let blob = format!("\0{username}\0{password}");
        let initial = STANDARD.encode(blob.as_bytes());

        let mut reply = self
            .command(Command::AuthPlain {
                initial: initial.clone(),
            })
            .await?;
        if reply.status == 334 {
            reply = self.command(Command::Raw(initial)).await?;
        }
        if !reply.is_positive_completion() {
            return Err(Error::AuthRejected {
                details: mailwire_net::truncate_details(&reply.message()),
            });
        }
        Ok(())
    }

    async fn authenticate_login(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self.command(Command::AuthLogin).await?;
        if reply.status != 334 {
            return Err(Error::AuthRejected {
                details: mailwire_net::truncate_details(&reply.message()),
            });
        }
        let reply = self
            .command(Command::Raw(STANDARD.encode(username.as_bytes())))
            .await?;
        if reply.status != 334 {
            return Err(Error::AuthRejected {
                details: mailwire_net::truncate_details(&reply.message()),
            });
        }
        let reply = self
            .command(Command::Raw(STANDARD.encode(password.as_bytes())))
            .await?;
        if !reply.is_positive_completion() {
            return Err(Error::AuthRejected {
                details: mailwire_net::truncate_details(&reply.message()),
            });
        }
        Ok(())
    }

    /// Submits a message.
    ///
    /// The envelope sender comes from `envelope`, else the message
    /// Sender, else the first From address. Recipients come from the
    /// envelope, else the union of To, Cc and Bcc, deduplicated
    /// case-insensitively with first occurrence order kept. The message
    /// is serialized with dot-stuffing and without its Bcc header.
    ///
    /// # Errors
    ///
    /// Returns an error when sender or recipients are missing or any
    /// command is refused; a refused RCPT is fatal for the submission.
    pub async fn send(&mut self, message: &Message, envelope: Option<&Envelope>) -> Result<Reply> {
        let mail_from = envelope
            .map(|envelope| envelope.mail_from.clone())
            .filter(|address| !address.is_empty())
            .or_else(|| sender_address(message))
            .ok_or(Error::NoSender)?;

        let mut recipients = envelope
            .map(|envelope| envelope.rcpt_to.clone())
            .unwrap_or_default();
        if recipients.is_empty() {
            recipients = collect_recipients(message);
        }
        let recipients = dedup_recipients(recipients);
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let reply = self
            .command(Command::MailFrom { address: mail_from })
            .await?;
        if !reply.is_positive_completion() {
            return Err(Error::rejected(reply.status, &reply.message()));
        }

        for recipient in recipients {
            let reply = self.command(Command::RcptTo { address: recipient }).await?;
            if !reply.is_positive_completion() {
                return Err(Error::rejected(reply.status, &reply.message()));
            }
        }

        let reply = self.command(Command::Data).await?;
        if !reply.is_positive_intermediate() {
            return Err(Error::rejected(reply.status, &reply.message()));
        }

        let options = FormatOptions {
            dot_escape: true,
            add_bcc_header: false,
        };
        let mut data = message.format(&options)?;
        data.push_str("\r\n.\r\n");
        self.dialog_mut()?.write_raw(data.as_bytes()).await?;

        let reply = self.read_reply().await?;
        if !reply.is_positive_completion() {
            return Err(Error::rejected(reply.status, &reply.message()));
        }
        tracing::debug!(status = reply.status, "message accepted");
        Ok(reply)
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn noop(&mut self) -> Result<Reply> {
        self.command(Command::Noop).await
    }

    /// Sends RSET.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn rset(&mut self) -> Result<Reply> {
        self.command(Command::Rset).await
    }

    /// Sends QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn quit(&mut self) -> Result<Reply> {
        self.command(Command::Quit).await
    }

    fn install_stream(&mut self, stream: MailStream) {
        self.dialog = Some(Dialog::with_limits(
            stream,
            self.options.max_line_length,
            self.options.timeout,
        ));
    }

    fn dialog_mut(&mut self) -> Result<&mut Dialog<MailStream>> {
        self.dialog.as_mut().ok_or(Error::NotConnected)
    }

    fn connector(&mut self) -> Result<TlsConnector> {
        if let Some(connector) = &self.connector {
            return Ok(connector.clone());
        }
        let connector = self.options.tls.connector()?;
        self.connector = Some(connector.clone());
        Ok(connector)
    }

    async fn command(&mut self, command: Command) -> Result<Reply> {
        let line = command.serialize();
        self.dialog_mut()?.write_line(&line).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut reply = Reply::default();
        loop {
            let line = self.dialog_mut()?.read_line().await?;
            let parsed = parse_reply_line(&line)?;
            if reply.lines.is_empty() {
                reply.status = parsed.status;
            } else if reply.status != parsed.status {
                return Err(Error::protocol(&line));
            }
            reply.lines.push(parsed.text);
            if parsed.last {
                return Ok(reply);
            }
        }
    }
}

fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(mailwire_net::Error::from)
        .map_err(Error::from)
}

fn default_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "localhost".to_string())
}

fn sender_address(message: &Message) -> Option<String> {
    if let Some(sender) = &message.sender {
        if !sender.address.is_empty() {
            return Some(sender.address.clone());
        }
    }
    message
        .from
        .all_addresses()
        .iter()
        .map(|address| address.address.clone())
        .find(|address| !address.is_empty())
}

fn collect_recipients(message: &Message) -> Vec<String> {
    let mut out = Vec::new();
    for boxes in [&message.to, &message.cc, &message.bcc] {
        for address in boxes.all_addresses() {
            if !address.address.is_empty() {
                out.push(address.address.clone());
            }
        }
    }
    out
}

fn dedup_recipients(recipients: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        if seen.insert(recipient.to_ascii_lowercase()) {
            out.push(recipient);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mailwire_mime::{Address, Group};

    use super::*;

    #[test]
    fn dedup_is_case_insensitive_and_order_preserving() {
        let recipients = vec![
            "Kaylee@Example.org".to_string(),
            "mal@example.org".to_string(),
            "kaylee@example.org".to_string(),
            "MAL@EXAMPLE.ORG".to_string(),
            "zoe@example.org".to_string(),
        ];
        assert_eq!(
            dedup_recipients(recipients),
            vec![
                "Kaylee@Example.org".to_string(),
                "mal@example.org".to_string(),
                "zoe@example.org".to_string(),
            ]
        );
    }

    #[test]
    fn recipients_include_group_members() {
        let mut message = Message::new();
        message
            .to
            .addresses
            .push(Address::address_only("mal@example.org"));
        message.to.groups.push(Group {
            name: "crew".to_string(),
            members: vec![Address::address_only("zoe@example.org")],
        });
        message
            .cc
            .addresses
            .push(Address::address_only("book@example.org"));
        message
            .bcc
            .addresses
            .push(Address::address_only("secret@example.org"));

        assert_eq!(
            collect_recipients(&message),
            vec![
                "mal@example.org".to_string(),
                "zoe@example.org".to_string(),
                "book@example.org".to_string(),
                "secret@example.org".to_string(),
            ]
        );
    }

    #[test]
    fn sender_prefers_explicit_sender_over_from() {
        let mut message = Message::new();
        message
            .from
            .addresses
            .push(Address::address_only("from@example.org"));
        assert_eq!(sender_address(&message).unwrap(), "from@example.org");

        message.sender = Some(Address::address_only("sender@example.org"));
        assert_eq!(sender_address(&message).unwrap(), "sender@example.org");
    }

    #[test]
    fn sender_missing_for_empty_message() {
        let message = Message::new();
        assert!(sender_address(&message).is_none());
    }
}
