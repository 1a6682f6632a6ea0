//! Reference scanning over token streams.

use crate::{ParserOptions, Token};

/// A reference such as `http.send` or `input.users[i].name` found in a token
/// stream. Indices are into the scanned token slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpan {
    /// Index of the head identifier.
    pub start: usize,
    /// One past the last token of the leading `a.b.c` part.
    pub dotted_end: usize,
    /// One past the last token of the whole reference, brackets included.
    pub end: usize,
    /// The leading `a.b.c` part. String-keyed brackets are folded in, so
    /// `http["send"]` is named `http.send`.
    pub name: String,
}

impl RefSpan {
    pub fn head(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }

    /// Whether the reference is immediately called.
    pub fn is_call(&self, tokens: &[Token]) -> bool {
        self.dotted_end == self.end && tokens.get(self.end).is_some_and(|t| t.is_punct("("))
    }
}

/// Whether `tokens[i]` starts a reference: a non-keyword identifier that is
/// not itself a `.field` of something before it.
pub fn is_ref_head(tokens: &[Token], i: usize, options: &ParserOptions) -> bool {
    tokens[i].is_name(options) && !(i > 0 && tokens[i - 1].is_punct("."))
}

/// Every reference in `tokens`, in order of appearance. References nested
/// inside brackets are reported too.
pub fn refs<'a>(tokens: &'a [Token], options: &'a ParserOptions) -> impl Iterator<Item = RefSpan> + 'a {
    (0..tokens.len())
        .filter(move |&i| is_ref_head(tokens, i, options))
        .map(move |start| scan_ref(tokens, start))
}

fn scan_ref(tokens: &[Token], start: usize) -> RefSpan {
    let mut name = tokens[start].text.clone();
    let mut i = start + 1;
    while let (Some(open), Some(field)) = (tokens.get(i), tokens.get(i + 1)) {
        if open.is_punct(".") && field.kind == crate::TokenKind::Ident {
            name.push('.');
            name.push_str(&field.text);
            i += 2;
            continue;
        }
        let closed = tokens.get(i + 2).is_some_and(|t| t.is_punct("]"));
        match field.string_value() {
            Some(key) if open.is_punct("[") && closed => {
                name.push('.');
                name.push_str(&key);
                i += 3;
            }
            _ => break,
        }
    }
    let dotted_end = i;

    loop {
        match tokens.get(i) {
            Some(t) if t.is_punct("[") => match closing_bracket(tokens, i) {
                Some(close) => i = close + 1,
                None => break,
            },
            Some(t)
                if t.is_punct(".")
                    && tokens
                        .get(i + 1)
                        .is_some_and(|f| f.kind == crate::TokenKind::Ident) =>
            {
                i += 2
            }
            _ => break,
        }
    }

    RefSpan {
        start,
        dotted_end,
        end: i,
        name,
    }
}

fn closing_bracket(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.opens() {
            depth += 1;
        } else if t.closes() {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
