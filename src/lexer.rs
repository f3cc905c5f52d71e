//! The scanner.
//!
//! Turns a [`SourceView`] into position-tagged tokens. Errors are
//! reported into the diagnostic buffer and the scanner resynchronizes by
//! skipping the offending character, so one bad literal produces one
//! diagnostic and the rest of the input still lexes.

use crate::err;
use crate::errors::Phase;
use crate::source::SourceView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `[0-9]+`
    Int,
    /// `[0-9]+ '.' [0-9]*`
    Float,
    /// `"..."` with escapes
    Str,
    /// `'.'` with escapes
    Char,
    /// `:`
    Quote,
    Ident,
    LParen,
    RParen,
    LBrack,
    RBrack,
}

/// A token: its kind, its decoded text, and the 1-based position of its
/// first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

/// Identifiers and numbers end at whitespace or a block delimiter.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']')
}

fn punctuation(kind: TokenKind, text: &str, view: &mut SourceView<'_>) -> Option<Token> {
    let token = Token {
        kind,
        text: text.to_owned(),
        line: view.line(),
        column: view.column(),
    };
    view.read();
    Some(token)
}

/// Decode one escape sequence after the backslash has been consumed.
/// Reports and returns `None` on an unknown escape.
fn read_escape(view: &mut SourceView<'_>, text: &mut String) -> Option<()> {
    match view.peek() {
        Some('"') => text.push('"'),
        Some('\'') => text.push('\''),
        Some('\\') => text.push('\\'),
        Some('n') => text.push('\n'),
        Some('t') => text.push('\t'),
        Some('r') => text.push('\r'),
        Some('0') => text.push('\0'),
        Some(c) => {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Unknown escape sequence '\\{c}'."
            );
            view.read();
            return None;
        }
        None => {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Unexpected end of file in escape sequence."
            );
            return None;
        }
    }
    view.read();
    Some(())
}

/// Scan one token. Returns `None` after consuming whitespace, a comment,
/// or an erroneous character; the caller just tries again while input
/// remains.
pub fn lex(view: &mut SourceView<'_>) -> Option<Token> {
    let c = view.peek()?;

    if c == '#' {
        // comment to end of line
        view.read();
        while view.peek().is_some_and(|c| c != '\n') {
            view.read();
        }
        return None;
    }

    if c.is_whitespace() {
        while view.peek().is_some_and(char::is_whitespace) {
            view.read();
        }
        return None;
    }

    match c {
        ':' => return punctuation(TokenKind::Quote, ":", view),
        '(' => return punctuation(TokenKind::LParen, "(", view),
        ')' => return punctuation(TokenKind::RParen, ")", view),
        '[' => return punctuation(TokenKind::LBrack, "[", view),
        ']' => return punctuation(TokenKind::RBrack, "]", view),
        _ => {}
    }

    if c == '"' {
        return lex_string(view);
    }
    if c == '\'' {
        return lex_char(view);
    }
    if c.is_ascii_digit() {
        return lex_number(view);
    }

    if !c.is_control() {
        if c == '_' {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Identifiers cannot start with '_'."
            );
            view.read();
            return None;
        }
        let mut token = Token {
            kind: TokenKind::Ident,
            text: String::new(),
            line: view.line(),
            column: view.column(),
        };
        while let Some(c) = view.peek() {
            if is_delimiter(c) {
                break;
            }
            token.text.push(c);
            view.read();
        }
        return Some(token);
    }

    err!(
        Phase::Lex,
        view.line(),
        view.column(),
        "Unexpected character '{}' in input.",
        c.escape_default()
    );
    view.read();
    None
}

fn lex_string(view: &mut SourceView<'_>) -> Option<Token> {
    let mut token = Token {
        kind: TokenKind::Str,
        text: String::new(),
        line: view.line(),
        column: view.column(),
    };
    view.read(); // opening quote
    loop {
        match view.peek() {
            Some('"') => {
                view.read();
                return Some(token);
            }
            Some('\n') => {
                err!(
                    Phase::Lex,
                    view.line(),
                    view.column(),
                    "Line breaks are not permitted within string constants."
                );
                view.read();
                return None;
            }
            Some('\\') => {
                view.read();
                read_escape(view, &mut token.text)?;
            }
            Some(c) => {
                token.text.push(c);
                view.read();
            }
            None => {
                err!(
                    Phase::Lex,
                    view.line(),
                    view.column(),
                    "Unexpected end of file within string constant."
                );
                return None;
            }
        }
    }
}

fn lex_char(view: &mut SourceView<'_>) -> Option<Token> {
    let mut token = Token {
        kind: TokenKind::Char,
        text: String::new(),
        line: view.line(),
        column: view.column(),
    };
    view.read(); // opening quote
    match view.peek() {
        Some('\n') => {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Line breaks are not permitted within character constants."
            );
            view.read();
            return None;
        }
        Some('\\') => {
            view.read();
            read_escape(view, &mut token.text)?;
        }
        Some(c) => {
            token.text.push(c);
            view.read();
        }
        None => {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Unexpected end of file within character constant."
            );
            return None;
        }
    }
    if view.peek() == Some('\'') {
        view.read();
        Some(token)
    } else {
        err!(
            Phase::Lex,
            view.line(),
            view.column(),
            "More than one character in character constant."
        );
        view.read();
        None
    }
}

fn lex_number(view: &mut SourceView<'_>) -> Option<Token> {
    let mut token = Token {
        kind: TokenKind::Int,
        text: String::new(),
        line: view.line(),
        column: view.column(),
    };
    while view.peek().is_some_and(|c| c.is_ascii_digit()) {
        token.text.push(c_read(view));
    }
    if view.peek() == Some('.') {
        token.kind = TokenKind::Float;
        token.text.push(c_read(view));
        while view.peek().is_some_and(|c| c.is_ascii_digit()) {
            token.text.push(c_read(view));
        }
    }
    match view.peek() {
        Some(c) if !is_delimiter(c) => {
            err!(
                Phase::Lex,
                view.line(),
                view.column(),
                "Unexpected character '{c}' in numeric literal."
            );
            view.read();
            None
        }
        _ => Some(token),
    }
}

fn c_read(view: &mut SourceView<'_>) -> char {
    view.read().unwrap_or('\0')
}

/// Scan the whole view, collecting the tokens that survive.
pub fn lex_all(view: &mut SourceView<'_>) -> Vec<Token> {
    let mut tokens = Vec::new();
    while view.peek().is_some() {
        if let Some(token) = lex(view) {
            tokens.push(token);
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;
    use crate::source::Source;

    fn tokens_of(input: &str) -> Vec<Token> {
        errors::reset();
        let source = Source::from_str(input);
        let mut view = source.view();
        let tokens = lex_all(&mut view);
        assert_eq!(errors::count(), 0, "unexpected diagnostics for {input:?}");
        tokens
    }

    fn kinds_and_texts(input: &str) -> Vec<(TokenKind, String)> {
        tokens_of(input)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn lex_errors(input: &str) -> (Vec<Token>, Vec<String>) {
        errors::reset();
        let source = Source::from_str(input);
        let mut view = source.view();
        let tokens = lex_all(&mut view);
        let messages = errors::take().into_iter().map(|d| d.message).collect();
        (tokens, messages)
    }

    #[test]
    fn test_token_kinds() {
        use TokenKind::*;
        let cases: Vec<(&str, Vec<(TokenKind, &str)>)> = vec![
            ("42", vec![(Int, "42")]),
            ("3.25", vec![(Float, "3.25")]),
            ("12.", vec![(Float, "12.")]),
            ("hello", vec![(Ident, "hello")]),
            ("+", vec![(Ident, "+")]),
            ("a-b!", vec![(Ident, "a-b!")]),
            ("x_1", vec![(Ident, "x_1")]),
            (":x", vec![(Quote, ":"), (Ident, "x")]),
            ("( )", vec![(LParen, "("), (RParen, ")")]),
            ("[ ]", vec![(LBrack, "["), (RBrack, "]")]),
            (
                "(+ 1 2)",
                vec![
                    (LParen, "("),
                    (Ident, "+"),
                    (Int, "1"),
                    (Int, "2"),
                    (RParen, ")"),
                ],
            ),
            ("\"hi\"", vec![(Str, "hi")]),
            ("\"\"", vec![(Str, "")]),
            (r#""a\nb\t\"\\""#, vec![(Str, "a\nb\t\"\\")]),
            ("'q'", vec![(Char, "q")]),
            (r"'\n'", vec![(Char, "\n")]),
            (r"'\0'", vec![(Char, "\0")]),
            // comments vanish
            ("1 # rest is ignored\n2", vec![(Int, "1"), (Int, "2")]),
            ("# only a comment", vec![]),
            ("", vec![]),
            ("   \n\t ", vec![]),
        ];
        for (i, (input, expected)) in cases.iter().enumerate() {
            let actual = kinds_and_texts(input);
            let expected: Vec<(TokenKind, String)> = expected
                .iter()
                .map(|(k, t)| (*k, (*t).to_owned()))
                .collect();
            assert_eq!(actual, expected, "lex case #{}: {input:?}", i + 1);
        }
    }

    #[test]
    fn test_token_positions() {
        let tokens = tokens_of("(let x 5)\n(+ x x)");
        let positions: Vec<(u32, u32)> = tokens.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(
            positions,
            vec![
                (1, 1),
                (1, 2),
                (1, 6),
                (1, 8),
                (1, 9),
                (2, 1),
                (2, 2),
                (2, 4),
                (2, 6),
                (2, 7),
            ]
        );
    }

    #[test]
    fn test_lex_errors() {
        let cases: Vec<(&str, &str)> = vec![
            (
                "\"broken\nrest",
                "Line breaks are not permitted within string constants.",
            ),
            ("\"unterminated", "Unexpected end of file within string constant."),
            (r#""bad\q""#, "Unknown escape sequence '\\q'."),
            ("_name", "Identifiers cannot start with '_'."),
            ("12x", "Unexpected character 'x' in numeric literal."),
            ("3.1x", "Unexpected character 'x' in numeric literal."),
            ("'ab'", "More than one character in character constant."),
            ("'a", "More than one character in character constant."),
            (
                "'\nx'",
                "Line breaks are not permitted within character constants.",
            ),
        ];
        for (i, (input, expected)) in cases.iter().enumerate() {
            let (_, messages) = lex_errors(input);
            assert!(
                messages.iter().any(|m| m.contains(expected)),
                "error case #{}: expected '{}' in {:?}",
                i + 1,
                expected,
                messages
            );
        }
    }

    #[test]
    fn test_lexer_resynchronizes_after_an_error() {
        // the broken string reports once; the rest of the line still lexes
        let (tokens, messages) = lex_errors("\"broken\n(+ 1 2)");
        assert_eq!(messages.len(), 1);
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_error_positions_point_at_the_offender() {
        errors::reset();
        let source = Source::from_str("  _x");
        let mut view = source.view();
        lex_all(&mut view);
        let diagnostics = errors::take();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (1, 3));
    }
}
