//! Phase-tagged diagnostics.
//!
//! Diagnostics are values in a buffer, never unwinding control flow:
//! producers report and then return an absent value, consumers check and
//! short-circuit. The buffer supports nested *frames* so that speculative
//! work (notably lambda return-type inference) can evaluate freely and
//! either promote its diagnostics to the enclosing frame or drop them.
//!
//! Within a frame, diagnostics whose rendered message is identical are
//! reported once.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};

use crate::source::Source;

/// The pipeline stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Lexical analysis.
    Lex,
    /// Parsing tokens into terms.
    Parse,
    /// Elaboration and evaluation.
    Type,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lex => write!(f, "TOKEN"),
            Phase::Parse => write!(f, "PARSE"),
            Phase::Type => write!(f, "TYPE"),
        }
    }
}

/// A single reported problem, anchored to a 1-based source position.
///
/// `message` is the full headline, including the phase prefix, e.g.
/// `[TYPE ERROR] Undefined variable 'foo'.`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

#[derive(Default)]
struct Frame {
    list: Vec<Diagnostic>,
    seen: HashSet<String>,
}

impl Frame {
    fn push(&mut self, diagnostic: Diagnostic) {
        if self.seen.insert(diagnostic.message.clone()) {
            self.list.push(diagnostic);
        }
    }
}

#[derive(Default)]
struct Buffer {
    root: Frame,
    frames: Vec<Frame>,
}

thread_local! {
    static BUFFER: RefCell<Buffer> = RefCell::new(Buffer::default());
}

fn with_current<R>(f: impl FnOnce(&mut Frame) -> R) -> R {
    BUFFER.with(|b| {
        let mut buffer = b.borrow_mut();
        if buffer.frames.is_empty() {
            f(&mut buffer.root)
        } else {
            let last = buffer.frames.len() - 1;
            f(&mut buffer.frames[last])
        }
    })
}

/// Report a diagnostic into the active frame.
pub fn report(phase: Phase, line: u32, column: u32, message: String) {
    let message = format!("[{phase} ERROR] {message}");
    with_current(|frame| {
        frame.push(Diagnostic {
            phase,
            line,
            column,
            message,
        });
    });
}

/// Report a diagnostic into the active frame.
///
/// ```ignore
/// err!(Phase::Type, line, column, "Undefined variable '{}'.", name);
/// ```
#[macro_export]
macro_rules! err {
    ($phase:expr, $line:expr, $column:expr, $($arg:tt)+) => {
        $crate::errors::report($phase, $line, $column, format!($($arg)+))
    };
}

/// Open a fresh frame; subsequent reports land in it.
pub fn catch_errors() {
    BUFFER.with(|b| b.borrow_mut().frames.push(Frame::default()));
}

/// Close the innermost frame, promoting its diagnostics to the frame below.
///
/// Promoted diagnostics re-deduplicate against the receiving frame.
pub fn release_errors() {
    let popped = BUFFER.with(|b| b.borrow_mut().frames.pop());
    if let Some(frame) = popped {
        for diagnostic in frame.list {
            with_current(|current| current.push(diagnostic));
        }
    }
}

/// Close the innermost frame, dropping its diagnostics.
pub fn discard_errors() {
    BUFFER.with(|b| {
        b.borrow_mut().frames.pop();
    });
}

/// The number of diagnostics in the active frame.
pub fn count() -> usize {
    with_current(|frame| frame.list.len())
}

/// Remove and return the active frame's diagnostics.
pub fn take() -> Vec<Diagnostic> {
    with_current(|frame| {
        frame.seen.clear();
        std::mem::take(&mut frame.list)
    })
}

/// Drop all diagnostics and frames.
pub fn reset() {
    BUFFER.with(|b| *b.borrow_mut() = Buffer::default());
}

/// Print the active frame's diagnostics: a count line, then each message
/// followed by its source line and a caret under the offending column
/// when `source` can supply the line.
pub fn print_all<W: Write>(out: &mut W, source: Option<&Source>) -> io::Result<()> {
    let diagnostics = with_current(|frame| frame.list.clone());
    let n = diagnostics.len();
    writeln!(out, "{} error{}", n, if n == 1 { "" } else { "s" })?;
    for diagnostic in &diagnostics {
        writeln!(out, "{}", diagnostic.message)?;
        if let Some(src) = source
            && let Some(line) = src.line_text(diagnostic.line)
        {
            writeln!(out, "    {line}")?;
            let pad = diagnostic.column.saturating_sub(1) as usize;
            writeln!(out, "    {}^", " ".repeat(pad))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_take() {
        reset();
        report(Phase::Type, 1, 2, "something failed".into());
        assert_eq!(count(), 1);

        let diagnostics = take();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "[TYPE ERROR] something failed");
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (1, 2));
        assert_eq!(count(), 0);
    }

    #[test]
    fn test_duplicate_messages_are_suppressed_within_a_frame() {
        reset();
        report(Phase::Lex, 1, 1, "same".into());
        report(Phase::Lex, 3, 7, "same".into());
        report(Phase::Lex, 1, 1, "different".into());
        assert_eq!(count(), 2);
    }

    #[test]
    fn test_release_promotes_to_outer_frame() {
        reset();
        report(Phase::Type, 1, 1, "outer".into());
        catch_errors();
        report(Phase::Type, 2, 1, "inner".into());
        assert_eq!(count(), 1); // only the inner frame is visible
        release_errors();
        assert_eq!(count(), 2);

        let messages: Vec<_> = take().into_iter().map(|d| d.message).collect();
        assert!(messages[0].contains("outer"));
        assert!(messages[1].contains("inner"));
    }

    #[test]
    fn test_release_rededuplicates_against_outer_frame() {
        reset();
        report(Phase::Type, 1, 1, "same".into());
        catch_errors();
        report(Phase::Type, 9, 9, "same".into());
        release_errors();
        assert_eq!(count(), 1);
    }

    #[test]
    fn test_discard_leaves_no_trace() {
        reset();
        catch_errors();
        report(Phase::Parse, 1, 1, "speculative".into());
        discard_errors();
        assert_eq!(count(), 0);
    }

    #[test]
    fn test_print_renders_line_and_caret() {
        reset();
        let src = Source::from_str("(foo 1)\n");
        report(Phase::Type, 1, 2, "Undefined variable 'foo'.".into());

        let mut out = Vec::new();
        print_all(&mut out, Some(&src)).expect("write to vec");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "1 error\n[TYPE ERROR] Undefined variable 'foo'.\n    (foo 1)\n     ^\n"
        );
        reset();
    }
}
