//! The surface AST.
//!
//! A [`Term`] is what the parser produces: atoms and blocks, each tagged
//! with the line and column of its first token. Terms support two
//! operations. [`Term::quote`] reifies the term as a [`Meta`] - atoms
//! become literal values, variables become symbols, blocks become arrays.
//! [`Term::eval`] elaborates the term into a typed [`Node`], dispatching
//! each block on its evaluated head.

use std::fmt;
use std::rc::Rc;

use crate::builtins;
use crate::env::EnvRef;
use crate::err;
use crate::errors::Phase;
use crate::meta::{Meta, MetaFunction};
use crate::node::{Node, NodeKind};
use crate::types;

#[derive(Debug, Clone, PartialEq)]
pub enum TermKind {
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Variable(String),
    Block(Vec<Term>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub kind: TermKind,
    pub line: u32,
    pub column: u32,
}

impl Term {
    pub fn new(kind: TermKind, line: u32, column: u32) -> Self {
        Term { kind, line, column }
    }

    pub fn int(value: i64, line: u32, column: u32) -> Self {
        Term::new(TermKind::Int(value), line, column)
    }

    pub fn float(value: f64, line: u32, column: u32) -> Self {
        Term::new(TermKind::Float(value), line, column)
    }

    pub fn char(value: char, line: u32, column: u32) -> Self {
        Term::new(TermKind::Char(value), line, column)
    }

    pub fn string(value: impl Into<String>, line: u32, column: u32) -> Self {
        Term::new(TermKind::Str(value.into()), line, column)
    }

    pub fn variable(name: impl Into<String>, line: u32, column: u32) -> Self {
        Term::new(TermKind::Variable(name.into()), line, column)
    }

    pub fn block(terms: Vec<Term>, line: u32, column: u32) -> Self {
        Term::new(TermKind::Block(terms), line, column)
    }

    /// The children of a block term; empty for atoms.
    pub fn block_terms(&self) -> &[Term] {
        match &self.kind {
            TermKind::Block(terms) => terms,
            _ => &[],
        }
    }

    /// Reify this term as a value.
    ///
    /// A block becomes an array of its children's quotes; the element type
    /// is the unique member type if the children agree, otherwise the sum
    /// of all member types.
    pub fn quote(&self) -> Meta {
        match &self.kind {
            TermKind::Int(v) => Meta::Int(*types::INT, *v),
            TermKind::Float(v) => Meta::Float(*types::FLOAT, *v),
            TermKind::Char(c) => Meta::Char(*c),
            TermKind::Str(s) => Meta::string(s.clone()),
            TermKind::Variable(name) => Meta::symbol(name),
            TermKind::Block(terms) => {
                let metas: Vec<Meta> = terms.iter().map(Term::quote).collect();
                let mut members = Vec::new();
                for m in &metas {
                    let t = m.ty().unwrap_or(*types::UNDEFINED);
                    if !members.contains(&t) {
                        members.push(t);
                    }
                }
                let element = if members.len() == 1 {
                    members[0]
                } else {
                    types::sum(members)
                };
                Meta::Array(types::array(element, metas.len() as i64), Rc::new(metas))
            }
        }
    }

    /// Elaborate this term into a typed node.
    ///
    /// Atoms elaborate directly. A block evaluates its head speculatively
    /// to decide dispatch: a type runs `declare`, a builtin function runs
    /// its native macro, any other function becomes a call. The head node
    /// is moved into the chosen builder, which consumes or drops it.
    pub fn eval(&self, env: &EnvRef) -> Option<Node> {
        match &self.kind {
            TermKind::Int(v) => Some(Node::new(NodeKind::Int(*v), self.line, self.column)),
            TermKind::Float(v) => Some(Node::new(NodeKind::Float(*v), self.line, self.column)),
            TermKind::Char(c) => Some(Node::new(NodeKind::Char(*c), self.line, self.column)),
            TermKind::Str(s) => Some(Node::new(
                NodeKind::Str(s.clone()),
                self.line,
                self.column,
            )),
            TermKind::Variable(name) => Some(Node::new(
                NodeKind::Variable(name.clone()),
                self.line,
                self.column,
            )),
            TermKind::Block(terms) => self.eval_block(terms, env),
        }
    }

    fn eval_block(&self, terms: &[Term], env: &EnvRef) -> Option<Node> {
        let Some(head_term) = terms.first() else {
            err!(
                Phase::Type,
                self.line,
                self.column,
                "First term in block is not a type or function."
            );
            return None;
        };
        let head = head_term.eval(env)?;
        let meta = head.eval(env);
        if meta.is_type() {
            return builtins::declare(env, head, self);
        }
        if let Meta::Function(_, f) = &meta {
            if let MetaFunction::Builtin(builtin) = &**f {
                return builtin(env, head, self);
            }
            return builtins::call(env, head, self);
        }
        err!(
            Phase::Type,
            head_term.line,
            head_term.column,
            "First term in block is not a type or function."
        );
        None
    }
}

fn escape(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Int(v) => write!(f, "{v}"),
            TermKind::Float(v) => write!(f, "{v:?}"),
            TermKind::Char(c) => write!(f, "'{}'", escape(&c.to_string())),
            TermKind::Str(s) => write!(f, "\"{}\"", escape(s)),
            TermKind::Variable(name) => write!(f, "{name}"),
            TermKind::Block(terms) => {
                write!(f, "(")?;
                for (i, t) in terms.iter().enumerate() {
                    write!(f, "{}{t}", if i == 0 { "" } else { " " })?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FLOAT, INT, STRING, SYMBOL};

    #[test]
    fn test_atom_quotes() {
        let cases: Vec<(Term, Meta)> = vec![
            (Term::int(42, 1, 1), Meta::Int(*INT, 42)),
            (Term::float(2.5, 1, 1), Meta::Float(*FLOAT, 2.5)),
            (Term::char('x', 1, 1), Meta::Char('x')),
            (Term::string("hi", 1, 1), Meta::string("hi")),
            (Term::variable("name", 1, 1), Meta::symbol("name")),
        ];
        for (i, (term, expected)) in cases.iter().enumerate() {
            assert_eq!(&term.quote(), expected, "quote case #{}", i + 1);
        }
    }

    #[test]
    fn test_homogeneous_block_quotes_to_a_plain_array() {
        let block = Term::block(
            vec![Term::int(1, 1, 2), Term::int(2, 1, 4), Term::int(3, 1, 6)],
            1,
            1,
        );
        let quoted = block.quote();
        assert_eq!(quoted.ty(), Some(crate::types::array(*INT, 3)));
        assert_eq!(format!("{quoted}"), "[1 2 3]");
    }

    #[test]
    fn test_mixed_block_quotes_to_a_sum_array() {
        let block = Term::block(
            vec![Term::variable("x", 1, 2), Term::int(1, 1, 4)],
            1,
            1,
        );
        let quoted = block.quote();
        let element = crate::types::sum(vec![*SYMBOL, *INT]);
        assert_eq!(quoted.ty(), Some(crate::types::array(element, 2)));
        assert_eq!(format!("{quoted}"), "[x 1]");
    }

    #[test]
    fn test_nested_block_quote() {
        let block = Term::block(
            vec![
                Term::string("s", 1, 2),
                Term::block(vec![Term::int(1, 1, 7)], 1, 6),
            ],
            1,
            1,
        );
        let quoted = block.quote();
        let inner = crate::types::array(*INT, 1);
        let element = crate::types::sum(vec![*STRING, inner]);
        assert_eq!(quoted.ty(), Some(crate::types::array(element, 2)));
        assert_eq!(format!("{quoted}"), "[s [1]]");
    }

    #[test]
    fn test_display_round_trips_shapes() {
        let cases: Vec<(Term, &str)> = vec![
            (Term::int(7, 1, 1), "7"),
            (Term::float(1.5, 1, 1), "1.5"),
            (Term::char('\n', 1, 1), "'\\n'"),
            (Term::string("a\"b", 1, 1), "\"a\\\"b\""),
            (
                Term::block(
                    vec![
                        Term::variable("+", 1, 2),
                        Term::int(1, 1, 4),
                        Term::int(2, 1, 6),
                    ],
                    1,
                    1,
                ),
                "(+ 1 2)",
            ),
        ];
        for (i, (term, expected)) in cases.iter().enumerate() {
            assert_eq!(format!("{term}"), *expected, "display case #{}", i + 1);
        }
    }
}
