//! Laurel - a small homoiconic, statically-typed, Lisp-like language
//!
//! This crate implements the core evaluator of a language that unifies
//! compile-time evaluation with program execution. Every source form is
//! *evaluated* in an environment, producing either a fully-known
//! compile-time value or a *runtime-typed* placeholder standing in for a
//! value whose computation is deferred.
//!
//! ```text
//! bytes → tokens → Terms → Nodes → Meta
//!          [lex]   [parse]  [term.eval]  [node.eval]
//! ```
//!
//! Evaluation happens in two passes per top-level term. First the surface
//! [`term::Term`] tree is elaborated into a typed [`node::Node`] tree by
//! evaluating each block's head - a type, a function value, or a built-in
//! macro - which then builds the node. Second, nodes are evaluated to
//! produce [`meta::Meta`] values. The REPL prints each value together with
//! its type:
//!
//! ```text
//! ? (let sq [x] (* x x))
//! <function> : (function i64 -> i64)
//! ? (sq 7)
//! 49 : i64
//! ```
//!
//! ## Strict semantics
//!
//! - Types are drawn from a nine-kind lattice (numbers, arrays, functions,
//!   macros, sums, intersections, named and runtime wrappers) and interned
//!   process-wide by a canonical mangle string, so type equality is pointer
//!   equality.
//! - Arithmetic promotes operands through the lattice `join` operation;
//!   incompatible operands yield no value rather than coercing.
//! - A definition without an initializer binds an *unbound runtime
//!   placeholder*; arithmetic over placeholders stays symbolic instead of
//!   inventing a value.
//! - Diagnostics are values in a buffer, never panics, and carry the
//!   source span they refer to.
//!
//! ## Modules
//!
//! - `source`: session source buffer with line/column views
//! - `lexer`: character-level scanner producing position-tagged tokens
//! - `parser`: tokens to surface terms
//! - `types`: the interned type lattice
//! - `meta`: compile-time values and their operations
//! - `env`: lexically nested, insertion-ordered environments
//! - `term`: surface AST; quoting and elaboration
//! - `node`: typed AST; evaluation
//! - `builtins`: built-in macros and the root environment
//! - `errors`: phase-tagged diagnostics with nested frames

pub mod builtins;
pub mod env;
pub mod errors;
pub mod lexer;
pub mod meta;
pub mod node;
pub mod parser;
pub mod source;
pub mod term;
pub mod types;

pub use errors::Phase;
pub use meta::Meta;
pub use source::Source;
