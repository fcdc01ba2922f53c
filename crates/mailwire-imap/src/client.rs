//! The IMAP access client.

use std::time::Duration;

use mailwire_mime::Message;
use mailwire_net::{
    connect, connect_tls, ensure_auth_allowed, AuthOptions, Dialog, MailStream, TlsMode,
    TlsOptions, DEFAULT_MAX_LINE_LENGTH,
};
use rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::tokenizer::{ResponseTokenizer, Token};
use crate::types::{
    render_ranges, to_quoted, MailboxStat, MessagesRange, Response, ResponseLine, SearchCondition,
    Status, StoreAction,
};

/// IMAP client options.
#[derive(Debug, Clone)]
pub struct ImapOptions {
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

impl Default for ImapOptions {
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

/// Asynchronous IMAP4rev1 client.
///
/// Commands carry monotonically increasing numeric tags; each command
/// collects untagged lines until the tagged reply with its own tag.
pub struct Client {
    dialog: Option<Dialog<MailStream>>,
    host: String,
    connector: Option<TlsConnector>,
    tag: u32,
    options: ImapOptions,
}

impl Client {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(options: ImapOptions) -> Self {
        Self {
            dialog: None,
            host: String::new(),
            connector: None,
            tag: 0,
            options,
        }
    }

    /// Creates a client over an already-established stream.
    #[must_use]
    pub fn from_stream(stream: MailStream, options: ImapOptions) -> Self {
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

    /// Reads the greeting: an untagged OK or PREAUTH line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectRejected`] on BYE and [`Error::Parse`]
    /// on anything else.
    pub async fn read_greeting(&mut self) -> Result<Response> {
        let line = self.read_response_line().await?;
        let head = line.fragments.first().cloned().unwrap_or_default();
        let (status, text) = parse_untagged_status(&head)?;
        match status {
            Status::Ok | Status::Preauth => Ok(Response {
                tag: String::new(),
                status,
                text,
                lines: vec![line],
            }),
            Status::Bye => Err(Error::ConnectRejected {
                details: mailwire_net::truncate_details(&text),
            }),
            Status::No | Status::Bad => Err(Error::parse(&head)),
        }
    }

    /// Queries server capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD.
    pub async fn capability(&mut self) -> Result<Vec<String>> {
        let response = self.command("CAPABILITY").await?;
        ensure_ok(&response)?;

        let mut capabilities = Vec::new();
        for line in &response.lines {
            if atom_at(&line.mandatory, 0) == Some("*")
                && atom_at(&line.mandatory, 1)
                    .is_some_and(|atom| atom.eq_ignore_ascii_case("CAPABILITY"))
            {
                capabilities.extend(
                    line.mandatory[2..]
                        .iter()
                        .filter_map(Token::as_atom)
                        .map(ToString::to_string),
                );
            }
        }
        Ok(capabilities)
    }

    /// Logs in with LOGIN; arguments are sent as quoted strings.
    ///
    /// # Errors
    ///
    /// Returns [`mailwire_net::Error::AuthForbidden`] (wrapped) when the
    /// cleartext policy denies the attempt and [`Error::Server`] when
    /// the server refuses the credentials.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        ensure_auth_allowed(self.is_tls(), &self.options.auth)?;
        let command = format!("LOGIN {} {}", to_quoted(username), to_quoted(password));
        let response = self.command(&command).await?;
        ensure_ok(&response)?;
        Ok(())
    }

    /// Upgrades the connection with STARTTLS.
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
        let response = self.command("STARTTLS").await?;
        ensure_ok(&response)?;

        let name = server_name(sni.unwrap_or(&self.host))?;
        let connector = self.connector()?;
        self.dialog_mut()?.start_tls(&connector, name).await?;
        tracing::debug!(host = %self.host, "connection upgraded to TLS");
        Ok(())
    }

    /// Selects a mailbox and gathers its statistics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when the mailbox cannot be selected.
    pub async fn select(&mut self, mailbox: &str) -> Result<MailboxStat> {
        let command = format!("SELECT {}", to_quoted(mailbox));
        let response = self.command(&command).await?;
        ensure_ok(&response)?;

        let mut stat = MailboxStat::default();
        for line in &response.lines {
            if atom_at(&line.mandatory, 0) == Some("*") {
                if let Some(number) = number_at(&line.mandatory, 1) {
                    match atom_at(&line.mandatory, 2) {
                        Some(kind) if kind.eq_ignore_ascii_case("EXISTS") => {
                            stat.messages_no = number;
                        }
                        Some(kind) if kind.eq_ignore_ascii_case("RECENT") => {
                            stat.recent_messages_no = number;
                        }
                        _ => {}
                    }
                }
            }
            if let (Some(code), Some(number)) =
                (atom_at(&line.optional, 0), number_at(&line.optional, 1))
            {
                if code.eq_ignore_ascii_case("UIDNEXT") {
                    stat.uid_next = number;
                } else if code.eq_ignore_ascii_case("UIDVALIDITY") {
                    stat.uid_validity = number;
                } else if code.eq_ignore_ascii_case("UNSEEN") {
                    stat.unseen_messages_no = number;
                }
            }
        }
        Ok(stat)
    }

    /// Fetches the raw RFC 822 text of one message via `BODY[]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD and [`Error::Parse`] when the
    /// response carries no literal.
    pub async fn fetch(&mut self, message_no: u32, uid: bool) -> Result<String> {
        let prefix = if uid { "UID " } else { "" };
        let command = format!("{prefix}FETCH {message_no} BODY[]");
        let response = self.command(&command).await?;
        ensure_ok(&response)?;

        response
            .lines
            .iter()
            .find_map(|line| line.literals.first())
            .map(|literal| String::from_utf8_lossy(literal).into_owned())
            .ok_or_else(|| Error::parse("fetch response carried no literal"))
    }

    /// Fetches and parses one message.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch or MIME parsing fails.
    pub async fn fetch_message(&mut self, message_no: u32, uid: bool) -> Result<Message> {
        let text = self.fetch(message_no, uid).await?;
        Ok(Message::parse(&text)?)
    }

    /// Updates message flags with STORE.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD.
    pub async fn store(
        &mut self,
        ranges: &[MessagesRange],
        action: StoreAction,
        flags: &[&str],
        silent: bool,
        uid: bool,
    ) -> Result<Response> {
        let prefix = if uid { "UID " } else { "" };
        let operation = match action {
            StoreAction::Add => "+FLAGS",
            StoreAction::Remove => "-FLAGS",
            StoreAction::Set => "FLAGS",
        };
        let suffix = if silent { ".SILENT" } else { "" };
        let command = format!(
            "{prefix}STORE {} {operation}{suffix} ({})",
            render_ranges(ranges),
            flags.join(" ")
        );
        let response = self.command(&command).await?;
        ensure_ok(&response)?;
        Ok(response)
    }

    /// Searches the selected mailbox; conditions AND together in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD.
    pub async fn search(
        &mut self,
        conditions: &[SearchCondition],
        uid: bool,
    ) -> Result<Vec<u32>> {
        let keys = if conditions.is_empty() {
            "ALL".to_string()
        } else {
            conditions
                .iter()
                .map(SearchCondition::to_imap_string)
                .collect::<Vec<_>>()
                .join(" ")
        };
        let prefix = if uid { "UID " } else { "" };
        let response = self.command(&format!("{prefix}SEARCH {keys}")).await?;
        ensure_ok(&response)?;

        let mut hits: Vec<u32> = Vec::new();
        for line in &response.lines {
            if atom_at(&line.mandatory, 0) == Some("*")
                && atom_at(&line.mandatory, 1)
                    .is_some_and(|atom| atom.eq_ignore_ascii_case("SEARCH"))
            {
                hits.extend(
                    line.mandatory[2..]
                        .iter()
                        .filter_map(Token::as_atom)
                        .filter_map(|atom| atom.parse::<u32>().ok()),
                );
            }
        }
        Ok(hits)
    }

    /// Marks one message deleted and closes the mailbox, expunging it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] when either command fails.
    pub async fn remove(&mut self, message_no: u32, uid: bool) -> Result<()> {
        self.store(
            &[MessagesRange::single(message_no)],
            StoreAction::Add,
            &["\\Deleted"],
            true,
            uid,
        )
        .await?;
        self.close().await
    }

    /// Closes the selected mailbox, expunging deleted messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD.
    pub async fn close(&mut self) -> Result<()> {
        let response = self.command("CLOSE").await?;
        ensure_ok(&response)?;
        Ok(())
    }

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Server`] on NO/BAD.
    pub async fn logout(&mut self) -> Result<()> {
        let response = self.command("LOGOUT").await?;
        ensure_ok(&response)?;
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

    fn next_tag(&mut self) -> String {
        self.tag += 1;
        self.tag.to_string()
    }

    /// Sends a command and collects lines until the tagged reply.
    async fn command(&mut self, text: &str) -> Result<Response> {
        let tag = self.next_tag();
        self.dialog_mut()?
            .write_line(&format!("{tag} {text}"))
            .await?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_response_line().await?;
            let head = line.fragments.first().cloned().unwrap_or_default();
            if is_tagged_response(&head, &tag) {
                let (status, text) = parse_tagged_status(&head, &tag)?;
                lines.push(line);
                return Ok(Response {
                    tag,
                    status,
                    text,
                    lines,
                });
            }
            lines.push(line);
        }
    }

    /// Reads one logical response line, resolving literals with exact
    /// octet reads against the dialog.
    async fn read_response_line(&mut self) -> Result<ResponseLine> {
        let mut tokenizer = ResponseTokenizer::new();
        let mut fragments = Vec::new();
        let mut literals = Vec::new();

        let line = self.dialog_mut()?.read_line().await?;
        tokenizer.feed_line(&line)?;
        fragments.push(line);

        while let Some(size) = tokenizer.pending_literal() {
            let value = self.dialog_mut()?.read_exactly(size).await?;
            literals.push(value.clone());
            tokenizer.supply_literal(value)?;

            let continuation = self.dialog_mut()?.read_line().await?;
            tokenizer.feed_line(&continuation)?;
            fragments.push(continuation);
        }

        let (mandatory, optional) = tokenizer.finish()?;
        Ok(ResponseLine {
            fragments,
            literals,
            mandatory,
            optional,
        })
    }
}

fn ensure_ok(response: &Response) -> Result<()> {
    if response.status == Status::Ok {
        return Ok(());
    }
    Err(Error::server(response.status, &response.text))
}

fn atom_at(tokens: &[Token], index: usize) -> Option<&str> {
    tokens.get(index).and_then(Token::as_atom)
}

fn number_at(tokens: &[Token], index: usize) -> Option<u64> {
    atom_at(tokens, index).and_then(|atom| atom.parse().ok())
}

fn split_first_word(text: &str) -> (&str, &str) {
    let trimmed = text.trim_start();
    match trimmed.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (trimmed, ""),
    }
}

fn parse_untagged_status(line: &str) -> Result<(Status, String)> {
    let Some(rest) = line.strip_prefix('*') else {
        return Err(Error::parse(line));
    };
    let (status_atom, text) = split_first_word(rest);
    let status = Status::parse(status_atom).ok_or_else(|| Error::parse(line))?;
    Ok((status, text.to_string()))
}

fn is_tagged_response(line: &str, tag: &str) -> bool {
    match line.strip_prefix(tag) {
        Some("") => true,
        Some(rest) => rest.starts_with(' '),
        None => false,
    }
}

fn parse_tagged_status(line: &str, tag: &str) -> Result<(Status, String)> {
    let rest = line
        .strip_prefix(tag)
        .ok_or_else(|| Error::parse(line))?;
    let (status_atom, text) = split_first_word(rest);
    let status = Status::parse(status_atom).ok_or_else(|| Error::parse(line))?;
    if !status.is_tagged() {
        return Err(Error::parse(line));
    }
    Ok((status, text.to_string()))
}

fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(mailwire_net::Error::from)
        .map_err(Error::from)
}
