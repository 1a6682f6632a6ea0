//! Tokenizer.
//!
//! Produces just enough structure to find statement boundaries and refs:
//! identifiers, literals, punctuation and line breaks. Comments and
//! horizontal whitespace are dropped.

use crate::{Error, Location, ParserOptions, Position};
use std::iter::Peekable;
use std::ops::Range;
use std::str::CharIndices;

const TWO_CHAR_PUNCT: &[&str] = &[":=", "==", "!=", "<=", ">="];
const ONE_CHAR_PUNCT: &str = "{}[]().,;:=<>+-*/%|&";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    String,
    RawString,
    Punct,
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Position,
    /// Byte range in the text that was tokenized.
    pub span: Range<usize>,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_newline(&self) -> bool {
        self.kind == TokenKind::Newline
    }

    pub fn opens(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text.as_str(), "{" | "[" | "(")
    }

    pub fn closes(&self) -> bool {
        self.kind == TokenKind::Punct && matches!(self.text.as_str(), "}" | "]" | ")")
    }

    /// A non-keyword identifier.
    pub fn is_name(&self, options: &ParserOptions) -> bool {
        self.kind == TokenKind::Ident && !options.is_keyword(&self.text)
    }

    pub fn is_keyword(&self, keyword: &str, options: &ParserOptions) -> bool {
        self.is_ident(keyword) && options.is_keyword(keyword)
    }

    /// Whether this token can close a term, so that a following `{` opens a
    /// rule body rather than a collection literal.
    pub fn ends_term(&self, options: &ParserOptions) -> bool {
        match self.kind {
            TokenKind::Number | TokenKind::String | TokenKind::RawString => true,
            TokenKind::Ident => {
                !options.is_keyword(&self.text)
                    || matches!(self.text.as_str(), "true" | "false" | "null")
            }
            TokenKind::Punct => matches!(self.text.as_str(), ")" | "]" | "}"),
            TokenKind::Newline => false,
        }
    }

    /// The literal value of a string token.
    pub fn string_value(&self) -> Option<String> {
        match self.kind {
            TokenKind::String => serde_json::from_str(&self.text).ok(),
            TokenKind::RawString => self
                .text
                .strip_prefix('`')
                .and_then(|s| s.strip_suffix('`'))
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Split `source` into tokens. `file` names the source in error locations.
pub fn tokenize(file: &str, source: &str) -> Result<Vec<Token>, Error> {
    Lexer::new(file, source).run()
}

struct Lexer<'a> {
    file: &'a str,
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    row: u32,
    col: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(file: &'a str, source: &'a str) -> Self {
        Self {
            file,
            source,
            chars: source.char_indices().peekable(),
            row: 1,
            col: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Error> {
        while let Some(c) = self.peek() {
            let start = self.offset();
            let pos = Position::new(self.row, self.col);
            let kind = match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                    continue;
                }
                '#' => {
                    self.eat_while(|c| c != '\n');
                    continue;
                }
                '\n' => {
                    self.bump();
                    TokenKind::Newline
                }
                '"' => {
                    self.string(pos)?;
                    TokenKind::String
                }
                '`' => {
                    self.raw_string(pos)?;
                    TokenKind::RawString
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
                    TokenKind::Ident
                }
                c if c.is_ascii_digit() => {
                    self.number(pos)?;
                    TokenKind::Number
                }
                _ => {
                    self.punct(pos)?;
                    TokenKind::Punct
                }
            };
            let end = self.offset();
            self.tokens.push(Token {
                kind,
                text: self.source[start..end].to_string(),
                pos,
                span: start..end,
            });
        }
        Ok(self.tokens)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn rest(&mut self) -> &'a str {
        let offset = self.offset();
        &self.source[offset..]
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&keep) {
            self.bump();
        }
    }

    fn string(&mut self, pos: Position) -> Result<(), Error> {
        self.bump();
        loop {
            match self.bump() {
                Some('"') => return Ok(()),
                Some('\\') => {
                    if self.bump().is_none() {
                        break;
                    }
                }
                Some('\n') | None => break,
                Some(_) => {}
            }
        }
        Err(self.error("non-terminated string", pos))
    }

    fn raw_string(&mut self, pos: Position) -> Result<(), Error> {
        self.bump();
        loop {
            match self.bump() {
                Some('`') => return Ok(()),
                None => return Err(self.error("non-terminated raw string", pos)),
                Some(_) => {}
            }
        }
    }

    fn number(&mut self, pos: Position) -> Result<(), Error> {
        self.eat_while(|c| c.is_ascii_digit());
        let mut rest = self.rest().chars();
        if rest.next() == Some('.') && rest.next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.eat_while(|c| c.is_ascii_digit());
        }
        let mut rest = self.rest().chars();
        if matches!(rest.next(), Some('e' | 'E')) {
            let next = rest.next();
            let digits_follow = match next {
                Some('+' | '-') => rest.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if digits_follow {
                self.bump();
                if matches!(next, Some('+' | '-')) {
                    self.bump();
                }
                self.eat_while(|c| c.is_ascii_digit());
            }
        }
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                Err(self.error("invalid number", pos))
            }
            _ => Ok(()),
        }
    }

    fn punct(&mut self, pos: Position) -> Result<(), Error> {
        let rest = self.rest();
        if TWO_CHAR_PUNCT.iter().any(|p| rest.starts_with(p)) {
            self.bump();
            self.bump();
            return Ok(());
        }
        match self.peek() {
            Some(c) if ONE_CHAR_PUNCT.contains(c) => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("illegal token {c:?}"), pos)),
            None => Err(self.error("unexpected eof", pos)),
        }
    }

    fn error(&self, message: impl Into<String>, pos: Position) -> Error {
        Error::parse(message).with_location(Location::new(self.file, pos))
    }
}
