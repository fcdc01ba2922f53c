//! MIME content type handling.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "png").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx), sorted by name.
    pub parameters: BTreeMap<String, String>,
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

impl ContentType {
    /// Creates a new content type without parameters.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a `text/plain; charset=utf-8` content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a `multipart/mixed` content type with a boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Creates a `multipart/alternative` content type with a boundary.
    #[must_use]
    pub fn multipart_alternative(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "alternative").with_parameter("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a `type/subtype; param=value` string.
    ///
    /// # Errors
    ///
    /// Returns an error when type or subtype are missing.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split(';');
        let type_part = parts
            .next()
            .ok_or_else(|| Error::InvalidContentType(text.to_string()))?
            .trim();
        let (main_type, sub_type) = type_part
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(text.to_string()))?;
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(text.to_string()));
        }

        let mut content_type = Self::new(
            main_type.trim().to_ascii_lowercase(),
            sub_type.trim().to_ascii_lowercase(),
        );
        for parameter in parts {
            if let Some((key, value)) = parameter.trim().split_once('=') {
                content_type.parameters.insert(
                    key.trim().to_ascii_lowercase(),
                    value.trim().trim_matches('"').to_string(),
                );
            }
        }
        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (key, value) in &self.parameters {
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}=\"{value}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_charset() {
        let ct = ContentType::parse("text/plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"==frontier==\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("==frontier=="));
    }

    #[test]
    fn parse_lowercases_types() {
        let ct = ContentType::parse("Text/HTML").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "html");
    }

    #[test]
    fn parse_rejects_missing_subtype() {
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/").is_err());
    }

    #[test]
    fn display_round_trip() {
        let ct = ContentType::multipart_mixed("b12345");
        let rendered = ct.to_string();
        assert_eq!(rendered, "multipart/mixed; boundary=b12345");
        assert_eq!(ContentType::parse(&rendered).unwrap(), ct);
    }

    #[test]
    fn display_quotes_special_values() {
        let ct = ContentType::new("multipart", "related").with_parameter("boundary", "a b/c");
        assert_eq!(ct.to_string(), "multipart/related; boundary=\"a b/c\"");
    }
}
