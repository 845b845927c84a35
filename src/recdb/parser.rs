//! RecDB parser (spec §4.1).
//!
//! Grammar (semantic level):
//! ```text
//! file    = object-body
//! object  = "{" object-body "}"
//! object-body = (key value ";")*
//! value   = qstring | "(" qstring ("," qstring)* ")" | object
//! key     = qstring
//! ```
//! Keys and qstrings are double-quoted with backslash escapes (`\"`, `\\`,
//! `\n`); whitespace and `#`-to-EOL comments outside strings are ignored.

use super::record::{OrderedObject, Record};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("expected '\"' to start a string at byte {0}")]
    ExpectedQuote(usize),
    #[error("expected ';' after value at byte {0}")]
    ExpectedSemicolon(usize),
    #[error("expected '}}' to close object at byte {0}")]
    ExpectedCloseBrace(usize),
    #[error("expected ')' to close string list at byte {0}")]
    ExpectedCloseParen(usize),
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("trailing data after top-level object at byte {0}")]
    TrailingData(usize),
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'#') => {
                    while let Some(b) = self.peek() {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_qstring(&mut self) -> Result<String, ParseError> {
        self.skip_trivia();
        let start = self.pos;
        if self.bump() != Some(b'"') {
            return Err(ParseError::ExpectedQuote(start));
        }
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedString(start)),
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    None => return Err(ParseError::UnterminatedString(start)),
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(other) => out.push(other as char),
                },
                Some(other) => out.push(other as char),
            }
        }
        Ok(out)
    }

    fn parse_string_list(&mut self) -> Result<Vec<String>, ParseError> {
        let open = self.pos;
        debug_assert_eq!(self.peek(), Some(b'('));
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_trivia();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_qstring()?);
            self.skip_trivia();
            match self.bump() {
                Some(b',') => {
                    self.skip_trivia();
                    continue;
                }
                Some(b')') => break,
                _ => return Err(ParseError::ExpectedCloseParen(open)),
            }
        }
        Ok(items)
    }

    fn parse_value(&mut self) -> Result<Record, ParseError> {
        self.skip_trivia();
        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                let obj = self.parse_object_body()?;
                self.skip_trivia();
                let close = self.pos;
                if self.bump() != Some(b'}') {
                    return Err(ParseError::ExpectedCloseBrace(close));
                }
                Ok(Record::Object(obj))
            }
            Some(b'(') => Ok(Record::StringList(self.parse_string_list()?)),
            Some(b'"') => Ok(Record::QString(self.parse_qstring()?)),
            _ => Err(ParseError::ExpectedQuote(self.pos)),
        }
    }

    fn parse_object_body(&mut self) -> Result<OrderedObject, ParseError> {
        let mut obj = OrderedObject::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None | Some(b'}') => break,
                _ => {}
            }
            let key = self.parse_qstring()?;
            let value = self.parse_value()?;
            self.skip_trivia();
            let semi = self.pos;
            if self.bump() != Some(b';') {
                return Err(ParseError::ExpectedSemicolon(semi));
            }
            obj.insert(key, value);
        }
        Ok(obj)
    }
}

/// Parse a full RecDB text document into an implicit top-level object.
pub fn parse(input: &str) -> Result<Record, ParseError> {
    let mut parser = Parser::new(input);
    let obj = parser.parse_object_body()?;
    parser.skip_trivia();
    if parser.pos != parser.bytes.len() {
        return Err(ParseError::TrailingData(parser.pos));
    }
    Ok(Record::Object(obj))
}
