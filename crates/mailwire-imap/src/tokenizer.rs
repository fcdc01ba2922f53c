//! Response line tokenizer.
//!
//! One tokenizer instance consumes a single logical response line, which
//! may span several physical lines when literals are present. Tokens land
//! in two buckets: the mandatory part and the optional part (the
//! bracketed response code of an OK/NO/BAD/BYE/PREAUTH reply).

use crate::error::{Error, Result};

/// One token of a response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare or quoted word.
    Atom(String),
    /// An octet-counted opaque string.
    Literal {
        /// Declared size in octets.
        size: usize,
        /// The octets, attached once read from the dialog.
        value: Vec<u8>,
    },
    /// A parenthesized list; lists nest.
    List(Vec<Token>),
}

impl Token {
    /// Returns the atom text when this token is an atom.
    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(text) => Some(text),
            Self::Literal { .. } | Self::List(_) => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LiteralState {
    None,
    Size(String),
    Waiting(usize),
}

/// Streaming tokenizer for one logical response line.
#[derive(Debug)]
pub struct ResponseTokenizer {
    mandatory: Vec<Token>,
    optional: Vec<Token>,
    list_stack: Vec<Vec<Token>>,
    in_optional: bool,
    atom: Option<String>,
    quoted: bool,
    escape: bool,
    literal: LiteralState,
}

impl Default for ResponseTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTokenizer {
    /// Creates a tokenizer for a fresh response line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mandatory: Vec::new(),
            optional: Vec::new(),
            list_stack: Vec::new(),
            in_optional: false,
            atom: None,
            quoted: false,
            escape: false,
            literal: LiteralState::None,
        }
    }

    /// Consumes one physical line of the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on grammar violations, including input
    /// arriving while a literal is still pending.
    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        for ch in line.chars() {
            if matches!(self.literal, LiteralState::Waiting(_)) {
                return Err(Error::parse("text after literal size"));
            }
            if self.quoted {
                self.feed_quoted(ch);
                continue;
            }
            if let LiteralState::Size(digits) = &mut self.literal {
                match ch {
                    '0'..='9' => digits.push(ch),
                    '}' => {
                        let size = digits
                            .parse()
                            .map_err(|_| Error::parse("invalid literal size"))?;
                        self.literal = LiteralState::Waiting(size);
                    }
                    _ => return Err(Error::parse("invalid character in literal size")),
                }
                continue;
            }
            self.feed_plain(ch)?;
        }
        if self.quoted {
            return Err(Error::parse("unterminated quoted string"));
        }
        self.flush_atom();
        Ok(())
    }

    fn feed_quoted(&mut self, ch: char) {
        if self.escape {
            self.escape = false;
            if let Some(atom) = self.atom.as_mut() {
                atom.push(ch);
            }
            return;
        }
        match ch {
            '\\' => self.escape = true,
            '"' => {
                self.quoted = false;
                self.flush_atom();
            }
            _ => {
                if let Some(atom) = self.atom.as_mut() {
                    atom.push(ch);
                }
            }
        }
    }

    fn feed_plain(&mut self, ch: char) -> Result<()> {
        match ch {
            '[' => {
                self.flush_atom();
                if self.in_optional {
                    return Err(Error::parse("nested optional part"));
                }
                self.in_optional = true;
            }
            ']' => {
                self.flush_atom();
                if !self.in_optional {
                    return Err(Error::parse("unmatched optional terminator"));
                }
                self.in_optional = false;
            }
            '(' => {
                self.flush_atom();
                self.list_stack.push(Vec::new());
            }
            ')' => {
                self.flush_atom();
                let Some(tokens) = self.list_stack.pop() else {
                    return Err(Error::parse("unmatched list terminator"));
                };
                self.push_token(Token::List(tokens));
            }
            '{' => {
                self.flush_atom();
                self.literal = LiteralState::Size(String::new());
            }
            '}' => return Err(Error::parse("unmatched literal terminator")),
            '"' => {
                self.flush_atom();
                self.atom = Some(String::new());
                self.quoted = true;
            }
            ' ' => self.flush_atom(),
            _ => self.atom.get_or_insert_with(String::new).push(ch),
        }
        Ok(())
    }

    /// Returns the size of the pending literal, if the last fed line
    /// ended in `{nnn}`.
    #[must_use]
    pub fn pending_literal(&self) -> Option<usize> {
        match self.literal {
            LiteralState::Waiting(size) => Some(size),
            LiteralState::None | LiteralState::Size(_) => None,
        }
    }

    /// Attaches the octets of the pending literal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when no literal is pending or the size
    /// does not match.
    pub fn supply_literal(&mut self, value: Vec<u8>) -> Result<()> {
        let LiteralState::Waiting(size) = self.literal else {
            return Err(Error::parse("no literal pending"));
        };
        if value.len() != size {
            return Err(Error::parse("literal size mismatch"));
        }
        self.push_token(Token::Literal { size, value });
        self.literal = LiteralState::None;
        Ok(())
    }

    /// Finishes the logical line, yielding the mandatory and optional
    /// token lists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] when lists, brackets or a literal are
    /// left open.
    pub fn finish(self) -> Result<(Vec<Token>, Vec<Token>)> {
        if !self.list_stack.is_empty() {
            return Err(Error::parse("unbalanced parenthesized list"));
        }
        if self.in_optional {
            return Err(Error::parse("unterminated optional part"));
        }
        if self.literal != LiteralState::None {
            return Err(Error::parse("unsatisfied literal"));
        }
        Ok((self.mandatory, self.optional))
    }

    fn flush_atom(&mut self) {
        if let Some(atom) = self.atom.take() {
            self.push_token(Token::Atom(atom));
        }
    }

    fn push_token(&mut self, token: Token) {
        if let Some(frame) = self.list_stack.last_mut() {
            frame.push(token);
        } else if self.in_optional {
            self.optional.push(token);
        } else {
            self.mandatory.push(token);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokenize(line: &str) -> (Vec<Token>, Vec<Token>) {
        let mut tokenizer = ResponseTokenizer::new();
        tokenizer.feed_line(line).unwrap();
        tokenizer.finish().unwrap()
    }

    fn atom(text: &str) -> Token {
        Token::Atom(text.to_string())
    }

    #[test]
    fn plain_atoms() {
        let (mandatory, optional) = tokenize("* 172 EXISTS");
        assert_eq!(mandatory, vec![atom("*"), atom("172"), atom("EXISTS")]);
        assert!(optional.is_empty());
    }

    #[test]
    fn quoted_atom_with_escapes() {
        let (mandatory, _) = tokenize(r#"* LIST "quoted \"name\" with \\ inside""#);
        assert_eq!(
            mandatory.last().unwrap(),
            &atom(r#"quoted "name" with \ inside"#)
        );
    }

    #[test]
    fn quoted_atom_keeps_structural_characters() {
        let (mandatory, optional) = tokenize(r#"* X "[(not structure)]""#);
        assert_eq!(mandatory, vec![atom("*"), atom("X"), atom("[(not structure)]")]);
        assert!(optional.is_empty());
    }

    #[test]
    fn empty_quoted_atom() {
        let (mandatory, _) = tokenize(r#"* OK """#);
        assert_eq!(mandatory, vec![atom("*"), atom("OK"), atom("")]);
    }

    #[test]
    fn nested_lists() {
        let (mandatory, _) = tokenize("* 1 FETCH (FLAGS (\\Seen \\Answered) UID 42)");
        let Token::List(outer) = &mandatory[3] else {
            panic!("expected list, got {:?}", mandatory[3]);
        };
        assert_eq!(outer[0], atom("FLAGS"));
        let Token::List(inner) = &outer[1] else {
            panic!("expected inner list");
        };
        assert_eq!(inner, &vec![atom("\\Seen"), atom("\\Answered")]);
        assert_eq!(&outer[2..], &[atom("UID"), atom("42")]);
    }

    #[test]
    fn optional_part_goes_to_its_own_bucket() {
        let (mandatory, optional) = tokenize("* OK [UIDVALIDITY 3857529045] UIDs valid");
        assert_eq!(mandatory[0], atom("*"));
        assert_eq!(mandatory[1], atom("OK"));
        assert_eq!(optional, vec![atom("UIDVALIDITY"), atom("3857529045")]);
        assert!(mandatory.contains(&atom("UIDs")));
    }

    #[test]
    fn literal_pauses_the_line() {
        let mut tokenizer = ResponseTokenizer::new();
        tokenizer.feed_line("* 1 FETCH (BODY[] {5}").unwrap();
        assert_eq!(tokenizer.pending_literal(), Some(5));

        tokenizer.supply_literal(b"hello".to_vec()).unwrap();
        assert_eq!(tokenizer.pending_literal(), None);

        tokenizer.feed_line(")").unwrap();
        let (mandatory, _) = tokenizer.finish().unwrap();
        let Token::List(list) = mandatory.last().unwrap() else {
            panic!("expected list");
        };
        assert_eq!(
            list.last().unwrap(),
            &Token::Literal {
                size: 5,
                value: b"hello".to_vec()
            }
        );
    }

    #[test]
    fn zero_length_literal() {
        let mut tokenizer = ResponseTokenizer::new();
        tokenizer.feed_line("* 1 FETCH (BODY[] {0}").unwrap();
        assert_eq!(tokenizer.pending_literal(), Some(0));
        tokenizer.supply_literal(Vec::new()).unwrap();
        tokenizer.feed_line(")").unwrap();
        assert!(tokenizer.finish().is_ok());
    }

    #[test]
    fn literal_size_mismatch_is_an_error() {
        let mut tokenizer = ResponseTokenizer::new();
        tokenizer.feed_line("* {4}").unwrap();
        assert!(tokenizer.supply_literal(b"hello".to_vec()).is_err());
    }

    #[test]
    fn text_after_literal_size_is_an_error() {
        let mut tokenizer = ResponseTokenizer::new();
        assert!(tokenizer.feed_line("* {4} trailing").is_err());
    }

    #[test]
    fn unbalanced_list_is_an_error() {
        let mut tokenizer = ResponseTokenizer::new();
        tokenizer.feed_line("* (unclosed").unwrap();
        assert!(tokenizer.finish().is_err());
    }

    #[test]
    fn unmatched_terminators_are_errors() {
        assert!(ResponseTokenizer::new().feed_line("* )").is_err());
        assert!(ResponseTokenizer::new().feed_line("* ]").is_err());
        assert!(ResponseTokenizer::new().feed_line("* }").is_err());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(ResponseTokenizer::new().feed_line("* \"open").is_err());
    }
}
