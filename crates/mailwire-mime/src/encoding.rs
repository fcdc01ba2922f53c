//! Transfer codecs, encoded words and line handling.
//!
//! Every codec is parameterized by a [`LinePolicy`] that bounds the length
//! of emitted lines. Decoding is lenient about folded whitespace; encoding
//! never exceeds the policy.

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::Encoding;

use crate::error::{Error, Result};

/// Line length policy for formatting and codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinePolicy {
    /// The RFC 5322 hard limit of 998 characters.
    Mandatory,
    /// The recommended limit of 78 characters.
    #[default]
    Recommended,
    /// No limit.
    None,
}

impl LinePolicy {
    /// Returns the limit in characters; unlimited maps to `usize::MAX`.
    #[must_use]
    pub const fn limit(self) -> usize {
        match self {
            Self::Mandatory => 998,
            Self::Recommended => 78,
            Self::None => usize::MAX,
        }
    }
}

/// Encodes data as Base64, wrapped in CRLF lines within the policy.
#[must_use]
pub fn encode_base64(data: &[u8], policy: LinePolicy) -> String {
    let encoded = STANDARD.encode(data);
    let limit = policy.limit();
    if encoded.len() <= limit {
        return encoded;
    }
    let mut out = String::with_capacity(encoded.len() + 2 * (encoded.len() / limit));
    let mut start = 0;
    while start < encoded.len() {
        let end = (start + limit).min(encoded.len());
        if start > 0 {
            out.push_str("\r\n");
        }
        out.push_str(&encoded[start..end]);
        start = end;
    }
    out
}

/// Decodes Base64 data, tolerating folded whitespace.
///
/// # Errors
///
/// Returns an error on any character outside the alphabet that is not
/// CRLF or whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned.as_bytes()).map_err(Into::into)
}

const fn qp_literal(byte: u8) -> bool {
    matches!(byte, 0x21..=0x3C | 0x3E..=0x7E)
}

/// Encodes data as Quoted-Printable (RFC 2045).
///
/// Octets below `0x21`, the equals sign and octets above `0x7E` become
/// `=HH`; TAB and SPACE stay literal except at end of line, where they
/// must be encoded. CRLF pairs in the input are preserved as hard breaks;
/// soft breaks keep every emitted line within the policy.
#[must_use]
pub fn encode_quoted_printable(data: &[u8], policy: LinePolicy) -> String {
    let limit = policy.limit();
    let mut out = String::with_capacity(data.len());
    let mut first = true;
    for line in split_crlf_lines(data) {
        if !first {
            out.push_str("\r\n");
        }
        first = false;
        qp_encode_line(line, limit, &mut out);
    }
    out
}

fn split_crlf_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n').map(|line| {
        if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        }
    })
}

fn qp_encode_line(line: &[u8], limit: usize, out: &mut String) {
    let mut length = 0;
    for (i, &byte) in line.iter().enumerate() {
        let at_end = i + 1 == line.len();
        let literal = qp_literal(byte) || ((byte == b' ' || byte == b'\t') && !at_end);
        let needed = if literal { 1 } else { 3 };
        if limit != usize::MAX && length + needed > limit - 1 {
            out.push_str("=\r\n");
            length = 0;
        }
        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        length += needed;
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks insert no octet; `=HH` escapes become their octet.
///
/// # Errors
///
/// Returns an error on a truncated or non-hex escape sequence.
pub fn decode_quoted_printable(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') {
            i += 3;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\n') {
            i += 2;
            continue;
        }
        let (Some(&hi), Some(&lo)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
            return Err(Error::InvalidEncoding(
                "truncated quoted-printable escape".to_string(),
            ));
        };
        let value = hex_value(hi)
            .zip(hex_value(lo))
            .map(|(hi, lo)| hi * 16 + lo)
            .ok_or_else(|| Error::InvalidEncoding("invalid quoted-printable escape".to_string()))?;
        out.push(value);
        i += 3;
    }
    Ok(out)
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Checks data for 7bit transfer: line lengths within policy, no octet
/// at or above `0x80`.
///
/// # Errors
///
/// Returns [`Error::LineTooLong`] or [`Error::InvalidEncoding`].
pub fn check_seven_bit(data: &[u8], policy: LinePolicy) -> Result<()> {
    check_line_lengths(data, policy)?;
    if data.iter().any(|&b| b >= 0x80) {
        return Err(Error::InvalidEncoding(
            "8-bit octet in 7bit content".to_string(),
        ));
    }
    Ok(())
}

/// Checks data for 8bit transfer: line lengths within policy.
///
/// # Errors
///
/// Returns [`Error::LineTooLong`] when a line exceeds the policy.
pub fn check_eight_bit(data: &[u8], policy: LinePolicy) -> Result<()> {
    check_line_lengths(data, policy)
}

fn check_line_lengths(data: &[u8], policy: LinePolicy) -> Result<()> {
    let limit = policy.limit();
    if limit == usize::MAX {
        return Ok(());
    }
    for line in split_crlf_lines(data) {
        if line.len() > limit {
            return Err(Error::LineTooLong(limit));
        }
    }
    Ok(())
}

const fn q_word_literal(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'!' | b'*' | b'+' | b'-' | b'/')
}

/// Longest encoded-word length permitted by RFC 2047.
const ENCODED_WORD_MAX: usize = 75;

/// Encodes text as RFC 2047 encoded words tagged UTF-8.
///
/// Chooses `Q` or `B` by the density of octets that would need escaping;
/// long inputs are emitted as several space-separated encoded words so no
/// word exceeds 75 characters.
#[must_use]
pub fn encode_word(text: &str) -> String {
    let bytes = text.as_bytes();
    let escaped = bytes.iter().filter(|&&b| !q_word_literal(b)).count();
    let use_q = escaped * 3 <= bytes.len();

    // "=?UTF-8?Q?" + payload + "?=" leaves this much payload per word.
    let budget = ENCODED_WORD_MAX - 12;
    let mut words = Vec::new();
    let mut chunk = String::new();
    let mut chunk_cost = 0;
    for ch in text.chars() {
        let cost = if use_q {
            ch.len_utf8() * 3
        } else {
            ch.len_utf8().div_ceil(3) * 4 + 4
        };
        if chunk_cost + cost > budget && !chunk.is_empty() {
            words.push(encode_single_word(&chunk, use_q));
            chunk.clear();
            chunk_cost = 0;
        }
        chunk.push(ch);
        chunk_cost += cost;
    }
    if !chunk.is_empty() {
        words.push(encode_single_word(&chunk, use_q));
    }
    words.join(" ")
}

fn encode_single_word(text: &str, use_q: bool) -> String {
    if use_q {
        let mut payload = String::new();
        for &byte in text.as_bytes() {
            if byte == b' ' {
                payload.push('_');
            } else if q_word_literal(byte) {
                payload.push(byte as char);
            } else {
                let _ = write!(payload, "={byte:02X}");
            }
        }
        format!("=?UTF-8?Q?{payload}?=")
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(text.as_bytes()))
    }
}

/// Encodes an unstructured header value, leaving pure ASCII untouched.
#[must_use]
pub fn encode_unstructured(text: &str) -> String {
    if text.is_ascii() && !text.contains("=?") {
        text.to_string()
    } else {
        encode_word(text)
    }
}

/// Decodes all RFC 2047 encoded words in an unstructured header value.
///
/// Handles any MIME charset tag known to `encoding_rs`; whitespace between
/// two adjacent encoded words is deleted per the RFC.
///
/// # Errors
///
/// Returns [`Error::Charset`] for a well-formed word with an unknown
/// charset and [`Error::InvalidEncoding`] for an undecodable payload.
pub fn decode_words(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last_was_encoded = false;
    let mut pending_ws = "";
    for token in split_whitespace_runs(text) {
        match token {
            WsToken::Whitespace(ws) => pending_ws = ws,
            WsToken::Word(word) => {
                if let Some(decoded) = decode_single_word(word)? {
                    if !last_was_encoded {
                        out.push_str(pending_ws);
                    }
                    out.push_str(&decoded);
                    last_was_encoded = true;
                } else {
                    out.push_str(pending_ws);
                    out.push_str(word);
                    last_was_encoded = false;
                }
                pending_ws = "";
            }
        }
    }
    out.push_str(pending_ws);
    Ok(out)
}

enum WsToken<'a> {
    Word(&'a str),
    Whitespace(&'a str),
}

fn split_whitespace_runs(text: &str) -> impl Iterator<Item = WsToken<'_>> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        let in_ws = bytes[pos].is_ascii_whitespace();
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() == in_ws {
            pos += 1;
        }
        let run = &text[start..pos];
        Some(if in_ws {
            WsToken::Whitespace(run)
        } else {
            WsToken::Word(run)
        })
    })
}

fn decode_single_word(word: &str) -> Result<Option<String>> {
    let Some(inner) = word
        .strip_prefix("=?")
        .and_then(|rest| rest.strip_suffix("?="))
    else {
        return Ok(None);
    };
    let mut parts = inner.splitn(3, '?');
    let (Some(charset), Some(kind), Some(payload)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };
    // An optional RFC 2231 language tag follows the charset after '*'.
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match kind {
        "B" | "b" => decode_base64(payload)?,
        "Q" | "q" => {
            let unspaced = payload.replace('_', " ");
            decode_quoted_printable(&unspaced)?
        }
        _ => return Ok(None),
    };

    let encoding = Encoding::for_label(charset.as_bytes())
        .ok_or_else(|| Error::Charset(charset.to_string()))?;
    let (decoded, _, malformed) = encoding.decode(&bytes);
    if malformed {
        return Err(Error::Charset(charset.to_string()));
    }
    Ok(Some(decoded.into_owned()))
}

/// Percent-encodes a parameter value (RFC 2231 simplified form).
#[must_use]
pub fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &byte in text.as_bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_') {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Decodes a percent-encoded parameter value.
///
/// # Errors
///
/// Returns an error on a truncated escape or invalid UTF-8.
pub fn percent_decode(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let value = bytes
                .get(i + 1)
                .copied()
                .and_then(hex_value)
                .zip(bytes.get(i + 2).copied().and_then(hex_value))
                .map(|(hi, lo)| hi * 16 + lo)
                .ok_or_else(|| Error::InvalidEncoding("invalid percent escape".to_string()))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(Into::into)
}

/// Folds a header into CRLF-terminated lines within the policy.
///
/// Wrapping happens at whitespace; continuation lines are indented with a
/// single space.
#[must_use]
pub fn fold_header(name: &str, value: &str, policy: LinePolicy) -> String {
    let limit = policy.limit();
    let mut out = String::with_capacity(name.len() + value.len() + 4);
    out.push_str(name);
    out.push(':');
    let mut length = name.len() + 1;
    let mut first = true;
    for word in value.split_ascii_whitespace() {
        if !first && length + 1 + word.len() > limit {
            out.push_str("\r\n");
            out.push(' ');
            length = 1;
        } else {
            out.push(' ');
            length += 1;
        }
        out.push_str(word);
        length += word.len();
        first = false;
    }
    out.push_str("\r\n");
    out
}

/// Unfolds a header value by joining CRLF-LWSP pairs with one space.
#[must_use]
pub fn unfold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        out.push_str(first.trim_end());
    }
    for line in lines {
        out.push(' ');
        out.push_str(line.trim());
    }
    out
}

/// Applies SMTP dot-stuffing: lines beginning with `.` get another `.`.
#[must_use]
pub fn dot_stuff(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in split_inclusive_crlf(text) {
        if segment.starts_with('.') {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

/// Reverses dot-stuffing: lines beginning with `.` lose one `.`.
#[must_use]
pub fn dot_unstuff(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for segment in split_inclusive_crlf(text) {
        match segment.strip_prefix('.') {
            Some(stripped) => out.push_str(stripped),
            None => out.push_str(segment),
        }
    }
    out
}

fn split_inclusive_crlf(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}
