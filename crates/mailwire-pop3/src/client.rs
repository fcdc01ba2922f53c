//! The POP3 retrieval client.

use std::collections::BTreeMap;
use std::time::Duration;

use mailwire_mime::Message;
use mailwire_net::{
    connect, connect_tls, ensure_auth_allowed, AuthOptions, Dialog, MailStream, TlsMode,
    TlsOptions, DEFAULT_MAX_LINE_LENGTH,
};
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::types::MailboxStat;

const OK_RESPONSE: &str = "+OK";
const ERR_RESPONSE: &str = "-ERR";
const END_OF_DATA: &str = ".";

/// POP3 client options.
#[derive(Debug, Clone)]
pub struct Pop3Options {
    /// TLS trust store and verification options.
    pub tls: TlsOptions,
    /// How the connection negotiates TLS.
    pub tls_mode: TlsMode,
    /// Cleartext-credentials policy.
    pub auth: AuthOptions,
    /// Maximum accepted line length.
    pub max_line_length: usize,
    /// Per-operation I/O timeout.
    pub timeout: Option<Duration>,
}

impl Default for Pop3Options {
    fn default() -> Self {
        Self {
            tls: TlsOptions::default(),
            tls_mode: TlsMode::Implicit,
            auth: AuthOptions::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Asynchronous POP3 client.
pub struct Client {
    dialog: Option<Dialog<MailStream>>,
    host: String,
    connector: Option<TlsConnector>,
    options: Pop3Options,
}

impl Client {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(options: Pop3Options) -> Self {
        Self {
            dialog: None,
            host: String::new(),
            connector: None,
            options,
        }
    }

    /// Creates a client over an already-established stream.
    #[must_use]
    pub fn from_stream(stream: MailStream, options: Pop3Options) -> Self {
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

    /// Reads the server greeting, expecting `+OK`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectRejected`] on `-ERR`.
    pub async fn read_greeting(&mut self) -> Result<String> {
        let line = self.dialog_mut()?.read_line().await?;
        let (ok, text) = parse_status(&line)?;
        if !ok {
            return Err(Error::ConnectRejected {
                details: mailwire_net::truncate_details(&text),
            });
        }
        Ok(text)
    }

    /// Queries server capabilities with CAPA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the server does not implement CAPA.
    pub async fn capa(&mut self) -> Result<Vec<String>> {
        self.send_command("CAPA").await?;
        self.read_ok_response().await?;
        self.read_data_lines().await
    }

    /// Upgrades the connection with STLS.
    ///
    /// SNI defaults to the connect host.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is already TLS, the server
    /// refuses the upgrade, or the handshake fails.
    pub async fn start_tls(&mut self, sni: Option<&str>) -> Result<()> {
        if self.is_tls() {
            return Err(Error::InvalidState("connection is already TLS".to_string()));
        }
        self.send_command("STLS").await?;
        self.read_ok_response().await?;

        let name = server_name(sni.unwrap_or(&self.host))?;
        let connector = self.connector()?;
        self.dialog_mut()?.start_tls(&connector, name).await?;
        tracing::debug!(host = %self.host, "connection upgraded to TLS");
        Ok(())
    }

    /// Authenticates with USER and PASS.
    ///
    /// # Errors
    ///
    /// Returns [`mailwire_net::Error::AuthForbidden`] (wrapped) when the
    /// cleartext policy denies the attempt, and [`Error::Server`] when
    /// the server refuses either credential.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        ensure_auth_allowed(self.is_tls(), &self.options.auth)?;

        self.send_command(&format!("USER {username}")).await?;
        self.read_ok_response().await?;

        self.send_command(&format!("PASS {password}")).await?;
        self.read_ok_response().await?;
        Ok(())
    }

    /// Reads mailbox statistics with STAT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when the reply does not carry two
    /// decimal numbers.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        self.send_command("STAT").await?;
        let text = self.read_ok_response().await?;
        let mut tokens = text.split_whitespace();
        let stat = tokens
            .next()
            .and_then(|count| count.parse().ok())
            .zip(tokens.next().and_then(|size| size.parse().ok()))
            .map(|(messages_no, mailbox_size)| MailboxStat {
                messages_no,
                mailbox_size,
            });
        stat.ok_or_else(|| Error::protocol(&text))
    }

    /// Lists every message with its size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the listing is refused.
    pub async fn list_all(&mut self) -> Result<BTreeMap<u32, u64>> {
        self.send_command("LIST").await?;
        self.read_ok_response().await?;

        let mut listing = BTreeMap::new();
        for line in self.read_data_lines().await? {
            if let Some((number, size)) = parse_listing_line(&line) {
                listing.insert(number, size);
            }
        }
        Ok(listing)
    }

    /// Lists one message (`message_no >= 1`) with its size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for message zero and
    /// [`Error::Server`] when the server refuses.
    pub async fn list(&mut self, message_no: u32) -> Result<(u32, u64)> {
        require_message_no(message_no)?;
        self.send_command(&format!("LIST {message_no}")).await?;
        let text = self.read_ok_response().await?;
        parse_listing_line(&text).ok_or_else(|| Error::protocol(&text))
    }

    /// Lists every message with its unique id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the listing is refused.
    pub async fn uidl_all(&mut self) -> Result<BTreeMap<u32, String>> {
        self.send_command("UIDL").await?;
        self.read_ok_response().await?;

        let mut listing = BTreeMap::new();
        for line in self.read_data_lines().await? {
            if let Some((number, uid)) = parse_uidl_line(&line) {
                listing.insert(number, uid);
            }
        }
        Ok(listing)
    }

    /// Returns the unique id of one message (`message_no >= 1`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for message zero and
    /// [`Error::Server`] when the server refuses.
    pub async fn uidl(&mut self, message_no: u32) -> Result<(u32, String)> {
        require_message_no(message_no)?;
        self.send_command(&format!("UIDL {message_no}")).await?;
        let text = self.read_ok_response().await?;
        parse_uidl_line(&text).ok_or_else(|| Error::protocol(&text))
    }

    /// Retrieves the raw text of a message, dot-unstuffed and
    /// CRLF-joined.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the message does not exist.
    pub async fn retr(&mut self, message_no: u32) -> Result<String> {
        require_message_no(message_no)?;
        self.send_command(&format!("RETR {message_no}")).await?;
        self.read_ok_response().await?;
        self.read_data_text().await
    }

    /// Retrieves the headers plus the first `lines` body lines of a
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the server refuses TOP.
    pub async fn top(&mut self, message_no: u32, lines: u32) -> Result<String> {
        require_message_no(message_no)?;
        self.send_command(&format!("TOP {message_no} {lines}"))
            .await?;
        self.read_ok_response().await?;
        self.read_data_text().await
    }

    /// Retrieves and parses a whole message.
    ///
    /// # Errors
    ///
    /// Returns an error when retrieval or MIME parsing fails.
    pub async fn fetch(&mut self, message_no: u32) -> Result<Message> {
        let text = self.retr(message_no).await?;
        Ok(Message::parse(&text)?)
    }

    /// Retrieves and parses only the headers of a message.
    ///
    /// # Errors
    ///
    /// Returns an error when retrieval or MIME parsing fails.
    pub async fn fetch_headers(&mut self, message_no: u32) -> Result<Message> {
        let text = self.top(message_no, 0).await?;
        Ok(Message::parse(&text)?)
    }

    /// Marks a message as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the message does not exist.
    pub async fn dele(&mut self, message_no: u32) -> Result<()> {
        require_message_no(message_no)?;
        self.send_command(&format!("DELE {message_no}")).await?;
        self.read_ok_response().await?;
        Ok(())
    }

    /// Unmarks every message marked as deleted.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn rset(&mut self) -> Result<()> {
        self.send_command("RSET").await?;
        self.read_ok_response().await?;
        Ok(())
    }

    /// Sends NOOP.
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn noop(&mut self) -> Result<()> {
        self.send_command("NOOP").await?;
        self.read_ok_response().await?;
        Ok(())
    }

    /// Ends the session, committing deletions (UPDATE state).
    ///
    /// # Errors
    ///
    /// Returns an error when the write or read fails.
    pub async fn quit(&mut self) -> Result<()> {
        self.send_command("QUIT").await?;
        self.read_ok_response().await?;
        Ok(())
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

    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.dialog_mut()?.write_line(command).await?;
        Ok(())
    }

    async fn read_ok_response(&mut self) -> Result<String> {
        let line = self.dialog_mut()?.read_line().await?;
        let (ok, text) = parse_status(&line)?;
        if ok {
            Ok(text)
        } else {
            Err(Error::server(&text))
        }
    }

    /// Reads a multi-line payload until the lone `.`, dot-unstuffing
    /// each line.
    async fn read_data_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.dialog_mut()?.read_line().await?;
            if line == END_OF_DATA {
                return Ok(lines);
            }
            let line = line
                .strip_prefix('.')
                .map_or(line.clone(), ToString::to_string);
            lines.push(line);
        }
    }

    async fn read_data_text(&mut self) -> Result<String> {
        let lines = self.read_data_lines().await?;
        let mut text = lines.join("\r\n");
        if !lines.is_empty() {
            text.push_str("\r\n");
        }
        Ok(text)
    }
}

fn parse_status(line: &str) -> Result<(bool, String)> {
    let (status, rest) = line
        .split_once(' ')
        .map_or((line, ""), |(status, rest)| (status, rest));
    match status {
        OK_RESPONSE => Ok((true, rest.to_string())),
        ERR_RESPONSE => Ok((false, rest.to_string())),
        _ => Err(Error::protocol(line)),
    }
}

fn parse_listing_line(line: &str) -> Option<(u32, u64)> {
    let mut tokens = line.split_whitespace();
    let number = tokens.next()?.parse().ok()?;
    let size = tokens.next()?.parse().ok()?;
    Some((number, size))
}

fn parse_uidl_line(line: &str) -> Option<(u32, String)> {
    let mut tokens = line.split_whitespace();
    let number = tokens.next()?.parse().ok()?;
    let uid = tokens.next()?.to_string();
    Some((number, uid))
}

fn require_message_no(message_no: u32) -> Result<()> {
    if message_no == 0 {
        return Err(Error::InvalidArgument(
            "message numbers start at 1; use the *_all form to list everything".to_string(),
        ));
    }
    Ok(())
}

fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(mailwire_net::Error::from)
        .map_err(Error::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_splits_text() {
        assert_eq!(
            parse_status("+OK 2 messages").unwrap(),
            (true, "2 messages".to_string())
        );
        assert_eq!(
            parse_status("-ERR no such message").unwrap(),
            (false, "no such message".to_string())
        );
        assert_eq!(parse_status("+OK").unwrap(), (true, String::new()));
    }

    #[test]
    fn parse_status_rejects_unknown_token() {
        assert!(parse_status("* OK imap greeting").is_err());
    }

    #[test]
    fn listing_lines() {
        assert_eq!(parse_listing_line("1 120"), Some((1, 120)));
        assert_eq!(parse_listing_line("garbage"), None);
        assert_eq!(parse_uidl_line("2 QhdPYR:00WBw1Ph7x7"), Some((2, "QhdPYR:00WBw1Ph7x7".to_string())));
    }

    #[test]
    fn message_zero_is_rejected() {
        assert!(matches!(
            require_message_no(0).unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(require_message_no(1).is_ok());
    }
}
