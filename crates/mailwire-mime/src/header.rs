//! Ordered MIME header list.
//!
//! Header names compare case-insensitively, repeated names are allowed and
//! insertion order is preserved on round-trip.

use crate::encoding::{fold_header, LinePolicy};
use crate::error::{Error, Result};

/// One header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Field name as written.
    pub name: String,
    /// Unfolded field value.
    pub value: String,
}

/// Ordered collection of email headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a header field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Replaces every field of this name with a single value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.add(name, value);
    }

    /// Returns the first value for a name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    /// Returns every value for a name, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
            .collect()
    }

    /// Removes every field of this name.
    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|header| !header.name.eq_ignore_ascii_case(name));
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|header| (header.name.as_str(), header.value.as_str()))
    }

    /// Parses a header block, unfolding continuation lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] on a line that is neither a
    /// `name: value` field nor a continuation.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<Header> = None;

        for line in text.lines() {
            if line.is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                let Some(header) = current.as_mut() else {
                    return Err(Error::InvalidHeader(line.to_string()));
                };
                header.value.push(' ');
                header.value.push_str(line.trim());
                continue;
            }
            if let Some(header) = current.take() {
                headers.entries.push(header);
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::InvalidHeader(line.to_string()));
            };
            if name.is_empty() || name.contains(' ') {
                return Err(Error::InvalidHeader(line.to_string()));
            }
            current = Some(Header {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            });
        }
        if let Some(header) = current {
            headers.entries.push(header);
        }
        Ok(headers)
    }

    /// Formats all headers, folded to the line policy.
    #[must_use]
    pub fn format(&self, policy: LinePolicy) -> String {
        let mut out = String::new();
        for header in &self.entries {
            out.push_str(&fold_header(&header.name, &header.value, policy));
        }
        out
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
