//! Session source buffer.
//!
//! A [`Source`] is an append-only UTF-8 buffer with a line table. The REPL
//! appends one input line per prompt; file mode loads the whole file up
//! front. [`SourceView`] reads the buffer character by character while
//! tracking a 1-based line and column, which every token and diagnostic
//! downstream inherits.

use std::fs;
use std::io;
use std::path::Path;

/// A growing buffer of source text plus the byte offset of each line start.
///
/// Tabs are expanded to four spaces on insertion so that diagnostic carets
/// line up with the printed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    text: String,
    lines: Vec<usize>,
}

impl Default for Source {
    fn default() -> Self {
        Source::new()
    }
}

impl Source {
    pub fn new() -> Self {
        Source {
            text: String::new(),
            lines: vec![0],
        }
    }

    /// Build a source holding `text` in full.
    pub fn from_str(text: &str) -> Self {
        let mut src = Self::new();
        src.push_str(text);
        src
    }

    /// Read a source file from disk.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::from_str(&fs::read_to_string(path)?))
    }

    fn push_char(&mut self, c: char) {
        if c == '\t' {
            self.text.push_str("    ");
        } else {
            self.text.push(c);
        }
        if c == '\n' {
            self.lines.push(self.text.len());
        }
    }

    /// Append text to the buffer, extending the line table.
    pub fn push_str(&mut self, text: &str) {
        for c in text.chars() {
            self.push_char(c);
        }
    }

    /// The 1-based number of the line the next appended character lands on.
    ///
    /// The REPL records this before appending an input line, then lexes
    /// only the appended region via [`Source::view_from_line`].
    pub fn next_line_number(&self) -> u32 {
        self.lines.len() as u32
    }

    /// The text of the given 1-based line, without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.lines.get(index)?;
        let end = self.lines.get(index + 1).copied().unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// A reading view over the whole buffer.
    pub fn view(&self) -> SourceView<'_> {
        SourceView {
            src: self,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// A reading view starting at the given 1-based line.
    pub fn view_from_line(&self, line: u32) -> SourceView<'_> {
        let index = (line as usize).saturating_sub(1).min(self.lines.len() - 1);
        SourceView {
            src: self,
            offset: self.lines[index],
            line: index as u32 + 1,
            column: 1,
        }
    }
}

/// A character cursor over a [`Source`] tracking 1-based line and column.
#[derive(Debug, Clone)]
pub struct SourceView<'a> {
    src: &'a Source,
    offset: usize,
    line: u32,
    column: u32,
}

impl SourceView<'_> {
    /// The next character, without consuming it. `None` at end of input.
    pub fn peek(&self) -> Option<char> {
        self.src.text[self.offset..].chars().next()
    }

    /// Consume and return the next character, advancing the position.
    pub fn read(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// 1-based line of the next character.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column of the next character.
    pub fn column(&self) -> u32 {
        self.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_tracks_lines_and_columns() {
        let src = Source::from_str("ab\ncd");
        let mut view = src.view();

        assert_eq!((view.line(), view.column()), (1, 1));
        assert_eq!(view.read(), Some('a'));
        assert_eq!((view.line(), view.column()), (1, 2));
        assert_eq!(view.read(), Some('b'));
        assert_eq!(view.read(), Some('\n'));
        assert_eq!((view.line(), view.column()), (2, 1));
        assert_eq!(view.read(), Some('c'));
        assert_eq!(view.read(), Some('d'));
        assert_eq!(view.read(), None);
        assert_eq!(view.peek(), None);
    }

    #[test]
    fn test_line_text_lookup() {
        let src = Source::from_str("first\nsecond\nthird");
        assert_eq!(src.line_text(1), Some("first"));
        assert_eq!(src.line_text(2), Some("second"));
        assert_eq!(src.line_text(3), Some("third"));
        assert_eq!(src.line_text(4), None);
        assert_eq!(src.line_text(0), None);
    }

    #[test]
    fn test_tabs_expand_to_spaces() {
        let src = Source::from_str("a\tb");
        assert_eq!(src.line_text(1), Some("a    b"));
    }

    #[test]
    fn test_appended_lines_extend_the_buffer() {
        let mut src = Source::new();
        assert_eq!(src.next_line_number(), 1);
        src.push_str("one\n");
        assert_eq!(src.next_line_number(), 2);

        let start = src.next_line_number();
        src.push_str("two\n");
        let mut view = src.view_from_line(start);
        assert_eq!((view.line(), view.column()), (2, 1));
        assert_eq!(view.read(), Some('t'));
        assert_eq!(src.line_text(1), Some("one"));
        assert_eq!(src.line_text(2), Some("two"));
    }
}
