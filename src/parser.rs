//! The parser.
//!
//! Recursive descent from tokens to [`Term`]s. `( … )` becomes a block of
//! its contents; `[ … ]` becomes a block with a synthetic leading `array`
//! variable; `:X` is sugar for `(quote X)`.

use crate::err;
use crate::errors::{self, Phase};
use crate::lexer::{Token, TokenKind};
use crate::term::Term;

/// A peek/read cursor over a lexed token vector.
pub struct TokenStream<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        TokenStream { tokens, index: 0 }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.index)
    }

    pub fn read(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;
        Some(token)
    }

    /// Position for end-of-input diagnostics: just past the last token.
    fn end_position(&self) -> (u32, u32) {
        match self.tokens.last() {
            Some(t) => (t.line, t.column + t.text.chars().count() as u32),
            None => (1, 1),
        }
    }
}

/// Parse one term. Reports and returns `None` on malformed input.
pub fn parse(stream: &mut TokenStream<'_>) -> Option<Term> {
    let Some(token) = stream.peek() else {
        let (line, column) = stream.end_position();
        err!(Phase::Parse, line, column, "Unexpected end of file.");
        return None;
    };
    match token.kind {
        TokenKind::Int => {
            stream.read();
            match token.text.parse::<i64>() {
                Ok(value) => Some(Term::int(value, token.line, token.column)),
                Err(_) => {
                    err!(
                        Phase::Parse,
                        token.line,
                        token.column,
                        "Integer literal '{}' is out of range.",
                        token.text
                    );
                    None
                }
            }
        }
        TokenKind::Float => {
            stream.read();
            let value = token.text.parse::<f64>().unwrap_or(0.0);
            Some(Term::float(value, token.line, token.column))
        }
        TokenKind::Str => {
            stream.read();
            Some(Term::string(token.text.clone(), token.line, token.column))
        }
        TokenKind::Char => {
            stream.read();
            let value = token.text.chars().next().unwrap_or('\0');
            Some(Term::char(value, token.line, token.column))
        }
        TokenKind::Ident => {
            stream.read();
            Some(Term::variable(token.text.clone(), token.line, token.column))
        }
        TokenKind::Quote => {
            stream.read();
            let quoted = parse(stream)?;
            Some(Term::block(
                vec![
                    Term::variable("quote", token.line, token.column),
                    quoted,
                ],
                token.line,
                token.column,
            ))
        }
        TokenKind::LParen => parse_block(stream),
        TokenKind::LBrack => parse_array(stream),
        TokenKind::RParen | TokenKind::RBrack => {
            err!(
                Phase::Parse,
                token.line,
                token.column,
                "Unexpected token '{}'.",
                token.text
            );
            None
        }
    }
}

/// `( … )`: a block of the parenthesized terms.
fn parse_block(stream: &mut TokenStream<'_>) -> Option<Term> {
    let Some(open) = stream.read() else {
        return None;
    };
    let (line, column) = (open.line, open.column);
    let mut contents = Vec::new();
    loop {
        match stream.peek() {
            None => {
                err!(Phase::Parse, line, column, "Unexpected end of file.");
                return None;
            }
            Some(t) if t.kind == TokenKind::RParen => {
                stream.read();
                return Some(Term::block(contents, line, column));
            }
            Some(_) => contents.push(parse(stream)?),
        }
    }
}

/// `[ … ]`: a block headed by a synthetic `array` variable.
fn parse_array(stream: &mut TokenStream<'_>) -> Option<Term> {
    let Some(open) = stream.read() else {
        return None;
    };
    let (line, column) = (open.line, open.column);
    let mut contents = vec![Term::variable("array", line, column)];
    loop {
        match stream.peek() {
            None => {
                err!(Phase::Parse, line, column, "Unexpected end of file.");
                return None;
            }
            Some(t) if t.kind == TokenKind::RBrack => {
                stream.read();
                return Some(Term::block(contents, line, column));
            }
            Some(_) => contents.push(parse(stream)?),
        }
    }
}

/// Parse every top-level term, stopping at the first diagnostic.
pub fn parse_all(stream: &mut TokenStream<'_>) -> Vec<Term> {
    let mut terms = Vec::new();
    while stream.peek().is_some() {
        if let Some(term) = parse(stream) {
            terms.push(term);
        }
        if errors::count() > 0 {
            break;
        }
    }
    terms
}
