//! RFC 5322 address lists.
//!
//! Supports display names (plain, quoted or MIME encoded words), bare
//! addr-specs, quoted local parts, domain literals, comments and group
//! syntax. Order is preserved on round-trip.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::encoding::{decode_words, encode_word};
use crate::error::{Error, Result};

/// One mailbox: an optional display name and an addr-spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Display name, decoded from encoded words where present.
    pub name: Option<String>,
    /// The `local@domain` addr-spec. Empty only for unresolved groups.
    pub address: String,
}

impl Address {
    /// Creates an address with a display name.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Creates an address without a display name.
    #[must_use]
    pub fn address_only(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    /// Renders the address for a header.
    #[must_use]
    pub fn format(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => {
                format!("{} <{}>", format_display_name(name), self.address)
            }
            _ => self.address.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// A named group of addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    /// Group display name.
    pub name: String,
    /// Member addresses, in order.
    pub members: Vec<Address>,
}

/// An ordered address list: plain addresses plus named groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailboxes {
    /// Addresses outside any group, in order.
    pub addresses: Vec<Address>,
    /// Groups, in order.
    pub groups: Vec<Group>,
}

impl Mailboxes {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list holding a single address.
    #[must_use]
    pub fn single(address: Address) -> Self {
        Self {
            addresses: vec![address],
            groups: Vec::new(),
        }
    }

    /// Returns true when neither addresses nor groups are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.groups.is_empty()
    }

    /// Returns every address including group members, in order.
    #[must_use]
    pub fn all_addresses(&self) -> Vec<&Address> {
        let mut out: Vec<&Address> = self.addresses.iter().collect();
        for group in &self.groups {
            out.extend(group.members.iter());
        }
        out
    }

    /// Renders the list for a header.
    #[must_use]
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = self.addresses.iter().map(Address::format).collect();
        for group in &self.groups {
            let members: Vec<String> = group.members.iter().map(Address::format).collect();
            parts.push(format!(
                "{}: {};",
                format_display_name(&group.name),
                members.join(", ")
            ));
        }
        parts.join(", ")
    }

    /// Parses an RFC 5322 address list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] on malformed syntax.
    pub fn parse(text: &str) -> Result<Self> {
        Parser::new(text).parse()
    }
}

impl fmt::Display for Mailboxes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

fn format_display_name(name: &str) -> String {
    if !name.is_ascii() {
        encode_word(name)
    } else if name.contains(|c| "()<>[]:;@\\,.\"".contains(c)) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        name.to_string()
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
        }
    }

    fn parse(mut self) -> Result<Mailboxes> {
        let mut boxes = Mailboxes::new();
        let mut group: Option<Group> = None;
        let mut display = String::new();

        while let Some(ch) = self.chars.next() {
            match ch {
                '"' => {
                    let quoted = self.read_quoted()?;
                    if self.chars.peek() == Some(&'@') {
                        // Quoted local part of a bare addr-spec.
                        display.push('"');
                        display.push_str(&quoted);
                        display.push('"');
                    } else {
                        display.push_str(&quoted);
                    }
                }
                '(' => self.skip_comment()?,
                '<' => {
                    let address = self.read_until('>')?;
                    let name = clean_display(&display)?;
                    let entry = Address {
                        name,
                        address: address.trim().to_string(),
                    };
                    push_address(&mut boxes, &mut group, entry);
                    display.clear();
                }
                ':' => {
                    if group.is_some() {
                        return Err(Error::InvalidAddress("nested group".to_string()));
                    }
                    group = Some(Group {
                        name: clean_display(&display)?.unwrap_or_default(),
                        members: Vec::new(),
                    });
                    display.clear();
                }
                ';' => {
                    flush_bare(&mut display, &mut boxes, &mut group)?;
                    let finished = group
                        .take()
                        .ok_or_else(|| Error::InvalidAddress("stray group terminator".to_string()))?;
                    boxes.groups.push(finished);
                }
                ',' => flush_bare(&mut display, &mut boxes, &mut group)?,
                _ => display.push(ch),
            }
        }

        flush_bare(&mut display, &mut boxes, &mut group)?;
        if group.is_some() {
            return Err(Error::InvalidAddress("unterminated group".to_string()));
        }
        Ok(boxes)
    }

    fn read_quoted(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some(escaped) => out.push(escaped),
                    None => {
                        return Err(Error::InvalidAddress(
                            "unterminated quoted string".to_string(),
                        ))
                    }
                },
                Some(ch) => out.push(ch),
                None => {
                    return Err(Error::InvalidAddress(
                        "unterminated quoted string".to_string(),
                    ))
                }
            }
        }
    }

    fn skip_comment(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            match self.chars.next() {
                Some('(') => depth += 1,
                Some(')') => depth -= 1,
                Some('\\') => {
                    self.chars.next();
                }
                Some(_) => {}
                None => {
                    return Err(Error::InvalidAddress("unterminated comment".to_string()));
                }
            }
        }
        Ok(())
    }

    fn read_until(&mut self, terminator: char) -> Result<String> {
        let mut out = String::new();
        for ch in self.chars.by_ref() {
            if ch == terminator {
                return Ok(out);
            }
            out.push(ch);
        }
        Err(Error::InvalidAddress(format!("missing '{terminator}'")))
    }
}

fn clean_display(display: &str) -> Result<Option<String>> {
    let trimmed = display.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(decode_words(trimmed)?))
}

fn push_address(boxes: &mut Mailboxes, group: &mut Option<Group>, entry: Address) {
    match group.as_mut() {
        Some(group) => group.members.push(entry),
        None => boxes.addresses.push(entry),
    }
}

fn flush_bare(
    display: &mut String,
    boxes: &mut Mailboxes,
    group: &mut Option<Group>,
) -> Result<()> {
    let trimmed = display.trim();
    if trimmed.is_empty() {
        display.clear();
        return Ok(());
    }
    if !trimmed.contains('@') {
        return Err(Error::InvalidAddress(trimmed.to_string()));
    }
    let entry = Address::address_only(trimmed.to_string());
    push_address(boxes, group, entry);
    display.clear();
    Ok(())
}
