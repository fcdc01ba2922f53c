//! MIME message model: parts, messages, parsing and formatting.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use encoding_rs::Encoding;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::address::{Address, Mailboxes};
use crate::content_type::ContentType;
use crate::encoding::{
    check_eight_bit, check_seven_bit, decode_base64, decode_quoted_printable, decode_words,
    dot_stuff, encode_base64, encode_quoted_printable, encode_unstructured, percent_decode,
    percent_encode, LinePolicy,
};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Content transfer encoding of a part body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Raw octets without line structure. Illegal for SMTP submission.
    Binary,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses a Content-Transfer-Encoding value; unknown tokens map to 7bit.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Binary => "binary",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
        };
        f.write_str(text)
    }
}

/// Content disposition of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// No Content-Disposition header.
    #[default]
    None,
    /// Displayed inline.
    Inline,
    /// Attached file.
    Attachment,
}

/// Options controlling [`Message::format`].
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Apply SMTP dot-stuffing to body lines beginning with `.`.
    pub dot_escape: bool,
    /// Emit the Bcc header. False for SMTP submission, true when writing
    /// to a local store.
    pub add_bcc_header: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            dot_escape: false,
            add_bcc_header: true,
        }
    }
}

/// A MIME entity: either a leaf with a body or a multipart with children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Content type with parameters (boundary, charset).
    pub content_type: ContentType,
    /// Transfer encoding applied to the body on the wire.
    pub encoding: TransferEncoding,
    /// Content disposition.
    pub disposition: Disposition,
    /// Disposition filename.
    pub filename: Option<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Content-Type name parameter.
    pub name: Option<String>,
    /// Headers not interpreted structurally, preserved in order.
    pub extra_headers: Headers,
    /// Decoded body octets; empty for multipart parts.
    pub body: Vec<u8>,
    /// Child parts; empty for leaves.
    pub parts: Vec<Part>,
}

impl Part {
    /// Creates an empty `text/plain` part.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the content type is `multipart/*`.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type.is_multipart()
    }

    /// Sets a UTF-8 text body and tags the charset accordingly.
    pub fn set_text(&mut self, text: &str) {
        self.body = text.as_bytes().to_vec();
        self.content_type
            .parameters
            .insert("charset".to_string(), "utf-8".to_string());
    }

    /// Returns the body converted from the tagged charset to a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Charset`] for an unknown or undecodable charset.
    pub fn body_text(&self) -> Result<String> {
        let charset = self.content_type.charset().unwrap_or("utf-8");
        let encoding = Encoding::for_label(charset.as_bytes())
            .ok_or_else(|| Error::Charset(charset.to_string()))?;
        let (text, _, malformed) = encoding.decode(&self.body);
        if malformed {
            return Err(Error::Charset(charset.to_string()));
        }
        Ok(text.into_owned())
    }

    /// Formats the part as a full MIME entity (headers, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error on a boundary collision or a body violating its
    /// transfer encoding.
    pub fn format(&self, policy: LinePolicy) -> Result<String> {
        let (headers, body) = self.format_inner(policy)?;
        Ok(format!("{}\r\n{body}", headers.format(policy)))
    }

    fn format_inner(&self, policy: LinePolicy) -> Result<(Headers, String)> {
        let mut headers = Headers::new();
        let mut content_type = self.content_type.clone();
        if let Some(name) = &self.name {
            content_type
                .parameters
                .insert("name".to_string(), name.clone());
        }

        let body = if self.is_multipart() {
            let children = self
                .parts
                .iter()
                .map(|part| part.format(policy))
                .collect::<Result<Vec<_>>>()?;
            let boundary = resolve_boundary(content_type.boundary(), &children)?;
            content_type
                .parameters
                .insert("boundary".to_string(), boundary.clone());

            let mut body = String::new();
            for child in &children {
                body.push_str("--");
                body.push_str(&boundary);
                body.push_str("\r\n");
                body.push_str(child);
                if !child.ends_with("\r\n") {
                    body.push_str("\r\n");
                }
            }
            body.push_str("--");
            body.push_str(&boundary);
            body.push_str("--\r\n");
            body
        } else {
            self.format_body(policy)?
        };

        headers.add("Content-Type", content_type.to_string());
        if self.encoding != TransferEncoding::SevenBit {
            headers.add("Content-Transfer-Encoding", self.encoding.to_string());
        }
        match self.disposition {
            Disposition::None => {}
            Disposition::Inline => headers.add("Content-Disposition", "inline"),
            Disposition::Attachment => {
                let value = match &self.filename {
                    Some(filename) if filename.is_ascii() => {
                        format!("attachment; filename=\"{filename}\"")
                    }
                    Some(filename) => {
                        format!("attachment; filename*=UTF-8''{}", percent_encode(filename))
                    }
                    None => "attachment".to_string(),
                };
                headers.add("Content-Disposition", value);
            }
        }
        if let Some(id) = &self.content_id {
            headers.add("Content-ID", format!("<{id}>"));
        }
        for (name, value) in self.extra_headers.iter() {
            headers.add(name, value);
        }
        Ok((headers, body))
    }

    fn format_body(&self, policy: LinePolicy) -> Result<String> {
        match self.encoding {
            TransferEncoding::SevenBit => {
                check_seven_bit(&self.body, policy)?;
                Ok(String::from_utf8_lossy(&self.body).into_owned())
            }
            TransferEncoding::EightBit => {
                check_eight_bit(&self.body, policy)?;
                Ok(String::from_utf8_lossy(&self.body).into_owned())
            }
            TransferEncoding::Binary => Ok(String::from_utf8_lossy(&self.body).into_owned()),
            TransferEncoding::Base64 => Ok(encode_base64(&self.body, policy)),
            TransferEncoding::QuotedPrintable => Ok(encode_quoted_printable(&self.body, policy)),
        }
    }

    /// Parses a full MIME entity.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed headers, boundaries or encodings.
    pub fn parse(text: &str) -> Result<Self> {
        let (header_block, body) = split_at_blank_line(text);
        let headers = Headers::parse(header_block)?;
        Self::from_headers(headers, body)
    }

    pub(crate) fn from_headers(headers: Headers, body: &str) -> Result<Self> {
        let mut part = Self::new();
        for (name, value) in headers.iter() {
            match name.to_ascii_lowercase().as_str() {
                "content-type" => {
                    let mut content_type = ContentType::parse(value)?;
                    if let Some(name) = content_type.parameters.remove("name") {
                        part.name = Some(name);
                    }
                    part.content_type = content_type;
                }
                "content-transfer-encoding" => {
                    part.encoding = TransferEncoding::parse(value);
                }
                "content-disposition" => {
                    let (disposition, filename) = parse_disposition(value)?;
                    part.disposition = disposition;
                    part.filename = filename;
                }
                "content-id" => {
                    part.content_id =
                        Some(value.trim().trim_matches(['<', '>']).to_string());
                }
                _ => part.extra_headers.add(name, value),
            }
        }

        if part.is_multipart() {
            let boundary = part
                .content_type
                .boundary()
                .filter(|boundary| !boundary.is_empty())
                .ok_or_else(|| Error::InvalidBoundary("missing boundary".to_string()))?
                .to_string();
            for segment in split_multipart(body, &boundary)? {
                part.parts.push(Self::parse(&segment)?);
            }
        } else {
            part.body = match part.encoding {
                TransferEncoding::Base64 => decode_base64(body)?,
                TransferEncoding::QuotedPrintable => decode_quoted_printable(body)?,
                _ => body.as_bytes().to_vec(),
            };
        }
        Ok(part)
    }
}

fn parse_disposition(value: &str) -> Result<(Disposition, Option<String>)> {
    let mut pieces = value.split(';');
    let kind = pieces.next().unwrap_or_default().trim();
    let disposition = if kind.eq_ignore_ascii_case("attachment") {
        Disposition::Attachment
    } else if kind.eq_ignore_ascii_case("inline") {
        Disposition::Inline
    } else {
        Disposition::None
    };

    let mut filename = None;
    for piece in pieces {
        let Some((key, raw)) = piece.trim().split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => filename = Some(raw.trim().trim_matches('"').to_string()),
            "filename*" => {
                // RFC 2231 simplified form: charset''percent-escaped.
                let encoded = raw.trim().rsplit("''").next().unwrap_or(raw.trim());
                filename = Some(percent_decode(encoded)?);
            }
            _ => {}
        }
    }
    Ok((disposition, filename))
}

fn resolve_boundary(existing: Option<&str>, children: &[String]) -> Result<String> {
    match existing {
        Some(boundary) if !boundary.is_empty() => {
            if children.iter().any(|child| child.contains(boundary)) {
                return Err(Error::InvalidBoundary(boundary.to_string()));
            }
            Ok(boundary.to_string())
        }
        _ => loop {
            let boundary: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(24)
                .map(char::from)
                .collect();
            if !children.iter().any(|child| child.contains(&boundary)) {
                return Ok(boundary);
            }
        },
    }
}

fn split_at_blank_line(text: &str) -> (&str, &str) {
    if let Some(pos) = text.find("\r\n\r\n") {
        (&text[..pos], &text[pos + 4..])
    } else if let Some(pos) = text.find("\n\n") {
        (&text[..pos], &text[pos + 2..])
    } else {
        (text, "")
    }
}

fn split_multipart(body: &str, boundary: &str) -> Result<Vec<String>> {
    let delimiter = format!("--{boundary}");
    let terminator = format!("--{boundary}--");

    let mut segments = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in body.lines() {
        let trimmed = line.trim_end();
        if trimmed == terminator {
            if let Some(lines) = current.take() {
                segments.push(lines.join("\r\n"));
            }
            return Ok(segments);
        }
        if trimmed == delimiter {
            if let Some(lines) = current.take() {
                segments.push(lines.join("\r\n"));
            }
            current = Some(Vec::new());
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
        // Anything before the first delimiter is preamble, skipped.
    }
    Err(Error::InvalidBoundary(format!(
        "missing terminator for boundary {boundary}"
    )))
}

/// A full email message: a MIME part plus the structural headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// The MIME content of the message.
    pub content: Part,
    /// From addresses.
    pub from: Mailboxes,
    /// Sender, when distinct from From.
    pub sender: Option<Address>,
    /// Reply-To addresses.
    pub reply_to: Mailboxes,
    /// To recipients.
    pub to: Mailboxes,
    /// Cc recipients.
    pub cc: Mailboxes,
    /// Bcc recipients.
    pub bcc: Mailboxes,
    /// Subject, decoded from encoded words.
    pub subject: String,
    /// Origination date with timezone.
    pub date: Option<DateTime<FixedOffset>>,
    /// Message-ID without angle brackets.
    pub message_id: Option<String>,
    /// In-Reply-To message ids.
    pub in_reply_to: Vec<String>,
    /// References message ids.
    pub references: Vec<String>,
    /// Line length policy used when formatting.
    pub line_policy: LinePolicy,
}

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a child part, for multipart messages.
    pub fn add_part(&mut self, part: Part) {
        self.content.parts.push(part);
    }

    /// Returns the message body as text (leaf messages only).
    ///
    /// # Errors
    ///
    /// Returns an error for multipart content or charset failures.
    pub fn body_text(&self) -> Result<String> {
        if self.content.is_multipart() {
            return Err(Error::InvalidContentType(
                "multipart message has no single body".to_string(),
            ));
        }
        self.content.body_text()
    }

    /// Serializes the message.
    ///
    /// # Errors
    ///
    /// Returns an error when the sender set is inconsistent, a boundary
    /// collides or a body violates its transfer encoding.
    pub fn format(&self, options: &FormatOptions) -> Result<String> {
        let policy = self.line_policy;
        let mut headers = Headers::new();

        if let Some(date) = &self.date {
            headers.add("Date", date.to_rfc2822());
        }
        if !self.from.is_empty() {
            headers.add("From", self.from.format());
        }
        if let Some(sender) = &self.sender {
            headers.add("Sender", sender.format());
        }
        if !self.reply_to.is_empty() {
            headers.add("Reply-To", self.reply_to.format());
        }
        if !self.to.is_empty() {
            headers.add("To", self.to.format());
        }
        if !self.cc.is_empty() {
            headers.add("Cc", self.cc.format());
        }
        if options.add_bcc_header && !self.bcc.is_empty() {
            headers.add("Bcc", self.bcc.format());
        }
        if let Some(id) = &self.message_id {
            headers.add("Message-ID", format!("<{id}>"));
        }
        if !self.in_reply_to.is_empty() {
            headers.add("In-Reply-To", format_id_list(&self.in_reply_to));
        }
        if !self.references.is_empty() {
            headers.add("References", format_id_list(&self.references));
        }
        if !self.subject.is_empty() {
            headers.add("Subject", encode_unstructured(&self.subject));
        }
        headers.add("MIME-Version", "1.0");

        let (content_headers, mut body) = self.content.format_inner(policy)?;
        for (name, value) in content_headers.iter() {
            headers.add(name, value);
        }
        if options.dot_escape {
            body = dot_stuff(&body);
        }

        Ok(format!("{}\r\n{body}", headers.format(policy)))
    }

    /// Parses a serialized message.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed headers, addresses, boundaries or
    /// encodings.
    pub fn parse(text: &str) -> Result<Self> {
        let (header_block, body) = split_at_blank_line(text);
        let headers = Headers::parse(header_block)?;

        let mut message = Self::new();
        let mut content_headers = Headers::new();
        for (name, value) in headers.iter() {
            match name.to_ascii_lowercase().as_str() {
                "from" => message.from = Mailboxes::parse(value)?,
                "sender" => {
                    message.sender = Mailboxes::parse(value)?.addresses.into_iter().next();
                }
                "reply-to" => message.reply_to = Mailboxes::parse(value)?,
                "to" => message.to = Mailboxes::parse(value)?,
                "cc" => message.cc = Mailboxes::parse(value)?,
                "bcc" => message.bcc = Mailboxes::parse(value)?,
                "subject" => message.subject = decode_words(value)?,
                "date" => {
                    message.date = DateTime::parse_from_rfc2822(value.trim()).ok();
                }
                "message-id" => {
                    message.message_id =
                        Some(value.trim().trim_matches(['<', '>']).to_string());
                }
                "in-reply-to" => message.in_reply_to = parse_id_list(value),
                "references" => message.references = parse_id_list(value),
                "mime-version" => {}
                _ => content_headers.add(name, value),
            }
        }
        message.content = Part::from_headers(content_headers, body)?;
        Ok(message)
    }

    /// Returns the number of attachment parts.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        let mut count = 0;
        walk_attachments(&self.content, &mut |_| count += 1);
        count
    }

    /// Returns the decoded bytes and file name of the `index`-th
    /// attachment (0-based).
    ///
    /// A part counts as an attachment when its disposition is
    /// `attachment` or its content type is neither `text/*` nor
    /// `multipart/*`.
    ///
    /// # Errors
    ///
    /// Returns an error when no such attachment exists.
    pub fn attachment(&self, index: usize) -> Result<(Vec<u8>, String)> {
        let mut found = None;
        let mut seen = 0;
        walk_attachments(&self.content, &mut |part| {
            if seen == index && found.is_none() {
                found = Some(part.clone());
            }
            seen += 1;
        });
        let part = found.ok_or_else(|| {
            Error::InvalidHeader(format!("no attachment at index {index}"))
        })?;
        let name = part
            .filename
            .clone()
            .or_else(|| part.name.clone())
            .unwrap_or_default();
        Ok((part.body, name))
    }
}

fn walk_attachments<'a>(part: &'a Part, visit: &mut impl FnMut(&'a Part)) {
    if part.is_multipart() {
        for child in &part.parts {
            walk_attachments(child, visit);
        }
        return;
    }
    let is_attachment = part.disposition == Disposition::Attachment
        || !(part.content_type.is_text() || part.content_type.is_multipart());
    if is_attachment {
        visit(part);
    }
}

fn format_id_list(ids: &[String]) -> String {
    ids.iter()
        .map(|id| format!("<{id}>"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_id_list(value: &str) -> Vec<String> {
    value
        .split_whitespace()
        .map(|id| id.trim_matches(['<', '>']).to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn simple_message() -> Message {
        let mut message = Message::new();
        message.from.addresses.push(Address::new(
            "mailwire library",
            "mailwire@example.org",
        ));
        message
            .to
            .addresses
            .push(Address::address_only("kaylee@example.org"));
        message.subject = "format test".to_string();
        message.date = Some(
            FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2014, 1, 17, 13, 30, 59)
                .unwrap(),
        );
        message.content.set_text("Hello, World!");
        message
    }

    #[test]
    fn format_simple_message() {
        let text = simple_message().format(&FormatOptions::default()).unwrap();
        assert!(text.contains("From: mailwire library <mailwire@example.org>\r\n"));
        assert!(text.contains("To: kaylee@example.org\r\n"));
        assert!(text.contains("Subject: format test\r\n"));
        assert!(text.contains("Date: Fri, 17 Jan 2014 13:30:59 +0200\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.ends_with("\r\n\r\nHello, World!"));
    }

    #[test]
    fn parse_simple_message() {
        let text = concat!(
            "From: mailwire library <mailwire@example.org>\r\n",
            "To: kaylee@example.org\r\n",
            "Subject: parse test\r\n",
            "Date: Fri, 17 Jan 2014 13:30:59 +0200\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Body line one\r\n",
            "Body line two\r\n",
        );
        let message = Message::parse(text).unwrap();
        assert_eq!(message.from.addresses[0].address, "mailwire@example.org");
        assert_eq!(message.subject, "parse test");
        assert!(message.date.is_some());
        assert_eq!(
            message.body_text().unwrap(),
            "Body line one\r\nBody line two\r\n"
        );
    }

    #[test]
    fn round_trip_simple_message() {
        let original = simple_message();
        let text = original.format(&FormatOptions::default()).unwrap();
        let parsed = Message::parse(&text).unwrap();
        assert_eq!(parsed.from, original.from);
        assert_eq!(parsed.to, original.to);
        assert_eq!(parsed.subject, original.subject);
        assert_eq!(parsed.date, original.date);
        assert_eq!(parsed.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn round_trip_cyrillic_subject_and_attachment() {
        let mut message = simple_message();
        message.subject = "Здраво, Свете!".to_string();

        let png_bytes: Vec<u8> = (0u8..=255).cycle().take(600).collect();
        let mut attachment = Part::new();
        attachment.content_type = ContentType::new("image", "png");
        attachment.encoding = TransferEncoding::Base64;
        attachment.disposition = Disposition::Attachment;
        attachment.filename = Some("aleph0.png".to_string());
        attachment.body = png_bytes.clone();

        let mut text_part = Part::new();
        text_part.set_text("Види прилог.");
        text_part.encoding = TransferEncoding::QuotedPrintable;

        message.content = Part::new();
        message.content.content_type = ContentType::multipart_mixed("frontier42");
        message.content.parts.push(text_part);
        message.content.parts.push(attachment);

        let wire = message.format(&FormatOptions::default()).unwrap();
        let parsed = Message::parse(&wire).unwrap();

        assert_eq!(parsed.subject, "Здраво, Свете!");
        assert_eq!(parsed.content.parts.len(), 2);
        assert_eq!(
            parsed.content.parts[0].body_text().unwrap(),
            "Види прилог."
        );
        let (bytes, name) = parsed.attachment(0).unwrap();
        assert_eq!(bytes, png_bytes);
        assert_eq!(name, "aleph0.png");
    }

    #[test]
    fn format_generates_boundary_when_missing() {
        let mut message = simple_message();
        message.content = Part::new();
        message.content.content_type = ContentType::new("multipart", "mixed");
        let mut child = Part::new();
        child.set_text("only part");
        message.content.parts.push(child);

        let wire = message.format(&FormatOptions::default()).unwrap();
        let parsed = Message::parse(&wire).unwrap();
        let boundary = parsed.content.content_type.boundary().unwrap().to_string();
        assert!(boundary.len() >= 20, "{boundary}");
        assert_eq!(parsed.content.parts.len(), 1);
    }

    #[test]
    fn format_rejects_colliding_boundary() {
        let mut message = simple_message();
        message.content = Part::new();
        message.content.content_type = ContentType::multipart_mixed("collision");
        let mut child = Part::new();
        child.set_text("the word collision appears here");
        message.content.parts.push(child);

        assert!(matches!(
            message.format(&FormatOptions::default()).unwrap_err(),
            Error::InvalidBoundary(_)
        ));
    }

    #[test]
    fn parse_rejects_missing_multipart_terminator() {
        let text = concat!(
            "Content-Type: multipart/mixed; boundary=frontier\r\n",
            "\r\n",
            "--frontier\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "part one\r\n",
        );
        assert!(matches!(
            Message::parse(text).unwrap_err(),
            Error::InvalidBoundary(_)
        ));
    }

    #[test]
    fn parse_multipart_with_preamble() {
        let text = concat!(
            "Content-Type: multipart/mixed; boundary=frontier\r\n",
            "\r\n",
            "This preamble is ignored.\r\n",
            "--frontier\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "part one\r\n",
            "--frontier--\r\n",
        );
        let message = Message::parse(text).unwrap();
        assert_eq!(message.content.parts.len(), 1);
        assert_eq!(message.content.parts[0].body_text().unwrap(), "part one");
    }

    #[test]
    fn dot_escape_stuffs_body_lines() {
        let mut message = simple_message();
        message.content.set_text("first\r\n.hidden\r\nlast");
        let options = FormatOptions {
            dot_escape: true,
            add_bcc_header: false,
        };
        let wire = message.format(&options).unwrap();
        assert!(wire.contains("\r\n..hidden\r\n"));
    }

    #[test]
    fn bcc_header_is_withheld_for_submission() {
        let mut message = simple_message();
        message
            .bcc
            .addresses
            .push(Address::address_only("secret@example.org"));

        let submission = message
            .format(&FormatOptions {
                dot_escape: true,
                add_bcc_header: false,
            })
            .unwrap();
        assert!(!submission.contains("secret@example.org"));

        let stored = message.format(&FormatOptions::default()).unwrap();
        assert!(stored.contains("Bcc: secret@example.org\r\n"));
    }

    #[test]
    fn seven_bit_body_rejects_high_octets() {
        let mut message = simple_message();
        message.content.body = "höhe".as_bytes().to_vec();
        message.content.encoding = TransferEncoding::SevenBit;
        assert!(message.format(&FormatOptions::default()).is_err());
    }

    #[test]
    fn message_id_round_trip() {
        let mut message = simple_message();
        message.message_id = Some("left@right.example.org".to_string());
        message.references = vec!["a@example.org".to_string(), "b@example.org".to_string()];

        let wire = message.format(&FormatOptions::default()).unwrap();
        assert!(wire.contains("Message-ID: <left@right.example.org>\r\n"));
        assert!(wire.contains("References: <a@example.org> <b@example.org>\r\n"));

        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.message_id.as_deref(), Some("left@right.example.org"));
        assert_eq!(parsed.references, message.references);
    }

    #[test]
    fn non_ascii_filename_uses_percent_encoding() {
        let mut attachment = Part::new();
        attachment.content_type = ContentType::new("application", "pdf");
        attachment.encoding = TransferEncoding::Base64;
        attachment.disposition = Disposition::Attachment;
        attachment.filename = Some("résumé.pdf".to_string());
        attachment.body = b"%PDF-fake".to_vec();

        let entity = attachment.format(LinePolicy::Recommended).unwrap();
        assert!(entity.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));

        let parsed = Part::parse(&entity).unwrap();
        assert_eq!(parsed.filename.as_deref(), Some("résumé.pdf"));
    }

    #[test]
    fn legacy_charset_body_is_converted() {
        let text = concat!(
            "Content-Type: text/plain; charset=iso-8859-2\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "=BEivot\r\n",
        );
        let part = Part::parse(text).unwrap();
        assert_eq!(part.body_text().unwrap(), "život\r\n");
    }
}
