//! Built-in macros and the root environment.
//!
//! A block's head is evaluated during elaboration; when it names one of
//! the builtins here, the builtin receives the environment, the head node
//! (by value - the builtin consumes or drops it), and the whole block
//! term, and builds the resulting [`Node`]. A head that evaluates to a
//! type dispatches to [`declare`]; a non-builtin function dispatches to
//! [`call`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::env::{Env, EnvRef};
use crate::err;
use crate::errors::Phase;
use crate::meta::{self, Meta, MetaFunction};
use crate::node::{ArithOp, Node, NodeKind};
use crate::term::{Term, TermKind};
use crate::types;

/// A native block-head macro: builds a node from a block term, or reports
/// and returns `None`.
pub type Builtin = fn(&EnvRef, Node, &Term) -> Option<Node>;

/// Outcome of scanning the terms after a block head for definition names.
struct NameScan {
    names: Vec<String>,
    /// Index of the first unconsumed term.
    next: usize,
    /// Index of the argument block, when the definition is function form.
    fn_args: Option<usize>,
}

/// Consume fresh symbols starting at `from` as definition names. A block
/// before the final term switches the definition to function form; a
/// non-symbol or an already-bound name ends the scan.
fn scan_names(env: &EnvRef, terms: &[Term], from: usize) -> NameScan {
    let mut i = from;
    let mut names = Vec::new();
    let mut fn_args = None;
    while i < terms.len() {
        let quoted = terms[i].quote();
        if quoted.is_array() && i + 1 < terms.len() {
            fn_args = Some(i);
            i += 1;
            break;
        }
        let Meta::Symbol(id) = quoted else { break };
        let name = meta::symbol_name(id);
        if env.borrow().lookup(&name).is_some() {
            break;
        }
        names.push(name);
        i += 1;
    }
    NameScan {
        names,
        next: i,
        fn_args,
    }
}

/// Elaborate the terms from `from` to the end of the block into a `Do`
/// body.
fn elaborate_body(env: &EnvRef, terms: &[Term], from: usize) -> Option<Node> {
    let mut body = Vec::new();
    for term in &terms[from..] {
        body.push(term.eval(env)?);
    }
    Some(Node::do_block(body))
}

fn lambda_node(
    ret: Option<Node>,
    args: Node,
    body: Node,
    line: u32,
    column: u32,
) -> Node {
    Node::new(
        NodeKind::Lambda {
            ret: ret.map(Box::new),
            args: vec![args],
            body: Rc::new(body),
            local: RefCell::new(None),
        },
        line,
        column,
    )
}

/// `let`: `(let name value)`, `(let name [args] body...)`, or several
/// names sharing one initializer. A leading bound name that evaluates to
/// a type makes the definition typed - `(let int y)` declares an
/// initializer-less `y`, and `(let int f [args] body...)` fixes the
/// function's return type.
pub fn define(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    drop(head);
    let terms = block.block_terms();

    let mut ty_node = None;
    let mut from = 1;
    if let Some(TermKind::Variable(name)) = terms.get(1).map(|t| &t.kind)
        && env.borrow().lookup(name).is_some_and(|bound| bound.is_type())
    {
        ty_node = Some(terms[1].eval(env)?);
        from = 2;
    }

    let NameScan {
        names,
        next,
        fn_args,
    } = scan_names(env, terms, from);

    if names.is_empty() {
        err!(
            Phase::Type,
            block.line,
            block.column,
            "No variable names provided in definition."
        );
        return None;
    }

    if let Some(arg_index) = fn_args {
        let args = terms[arg_index].eval(env)?;
        let body = elaborate_body(env, terms, next)?;
        let lambda = lambda_node(ty_node, args, body, block.line, block.column);
        return Some(Node::new(
            NodeKind::Define {
                ty: None,
                names,
                init: Some(Box::new(lambda)),
            },
            block.line,
            block.column,
        ));
    }

    if next == terms.len() {
        if let Some(ty) = ty_node {
            // a typed definition may omit its initializer
            return Some(Node::new(
                NodeKind::Define {
                    ty: Some(Box::new(ty)),
                    names,
                    init: None,
                },
                block.line,
                block.column,
            ));
        }
        let last = &terms[next - 1];
        err!(
            Phase::Type,
            last.line,
            last.column,
            "No initial value provided in variable declaration."
        );
        return None;
    }
    if next < terms.len() - 1 {
        err!(
            Phase::Type,
            terms[next].line,
            terms[next].column,
            "More than one initial value provided in variable declaration."
        );
        return None;
    }

    let init = terms[next].eval(env)?;
    Some(Node::new(
        NodeKind::Define {
            ty: ty_node.map(Box::new),
            names,
            init: Some(Box::new(init)),
        },
        block.line,
        block.column,
    ))
}

/// A block whose head evaluated to a type: `(int y)` declares, possibly
/// without an initializer, and `(int f [args] body...)` declares a
/// function with an explicit return type. The head node becomes the
/// definition's type node.
pub fn declare(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    let terms = block.block_terms();
    let NameScan {
        names,
        next,
        fn_args,
    } = scan_names(env, terms, 1);

    if names.is_empty() {
        err!(
            Phase::Type,
            block.line,
            block.column,
            "No variable names provided in definition."
        );
        return None;
    }

    if let Some(arg_index) = fn_args {
        let args = terms[arg_index].eval(env)?;
        let body = elaborate_body(env, terms, next)?;
        let lambda = lambda_node(Some(head), args, body, block.line, block.column);
        return Some(Node::new(
            NodeKind::Define {
                ty: None,
                names,
                init: Some(Box::new(lambda)),
            },
            block.line,
            block.column,
        ));
    }

    if next + 1 < terms.len() {
        err!(
            Phase::Type,
            terms[next + 1].line,
            terms[next + 1].column,
            "More than one initial value provided in variable declaration."
        );
        return None;
    }

    let init = if next < terms.len() {
        Some(Box::new(terms[next].eval(env)?))
    } else {
        None
    };
    Some(Node::new(
        NodeKind::Define {
            ty: Some(Box::new(head)),
            names,
            init,
        },
        block.line,
        block.column,
    ))
}

/// `lambda`: an argument block and at least one body term.
pub fn lambda(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    drop(head);
    let terms = block.block_terms();
    if terms.len() < 3 {
        err!(
            Phase::Type,
            block.line,
            block.column,
            "Not enough arguments in lambda expression: expected at least 3, found {}.",
            terms.len().saturating_sub(1)
        );
        return None;
    }

    if !terms[1].quote().is_array() {
        err!(
            Phase::Type,
            terms[1].line,
            terms[1].column,
            "Expected argument block in lambda expression."
        );
        return None;
    }

    let args = terms[1].eval(env)?;
    let body = elaborate_body(env, terms, 2)?;
    Some(lambda_node(None, args, body, block.line, block.column))
}

/// `quote`: exactly one term, reified at evaluation time.
pub fn quote(_env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    drop(head);
    let terms = block.block_terms();
    if terms.len() != 2 {
        err!(
            Phase::Type,
            block.line,
            block.column,
            "Expected exactly one term in quote expression."
        );
        return None;
    }
    Some(Node::new(
        NodeKind::Quote(terms[1].clone()),
        block.line,
        block.column,
    ))
}

/// `do`: one or more body terms evaluated in order.
pub fn do_block(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    drop(head);
    let terms = block.block_terms();
    let mut body = Vec::new();
    for term in &terms[1..] {
        body.push(term.eval(env)?);
    }
    if body.is_empty() {
        err!(
            Phase::Type,
            block.line,
            block.column,
            "No body provided to do-expression."
        );
        return None;
    }
    Some(Node::do_block(body))
}

/// A block headed by a non-builtin function value becomes a call.
pub fn call(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    let terms = block.block_terms();
    let mut args = Vec::new();
    for term in &terms[1..] {
        args.push(term.eval(env)?);
    }
    Some(Node::new(
        NodeKind::Call {
            func: Box::new(head),
            args,
        },
        block.line,
        block.column,
    ))
}

/// The bracket-block head: elaborates an argument list. Bare symbols
/// declare int-typed parameters; nested blocks elaborate normally, so
/// `[(float x)]` declares a typed parameter.
pub fn arglist(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
    drop(head);
    let terms = block.block_terms();
    let mut declarations = Vec::new();
    for term in &terms[1..] {
        match &term.kind {
            TermKind::Variable(name) => {
                let ty = Node::new(
                    NodeKind::Constant(Meta::Type(*types::INT)),
                    term.line,
                    term.column,
                );
                declarations.push(Node::new(
                    NodeKind::Define {
                        ty: Some(Box::new(ty)),
                        names: vec![name.clone()],
                        init: None,
                    },
                    term.line,
                    term.column,
                ));
            }
            TermKind::Block(_) => declarations.push(term.eval(env)?),
            _ => {
                err!(
                    Phase::Type,
                    term.line,
                    term.column,
                    "Expected argument declaration in argument list."
                );
                return None;
            }
        }
    }
    if declarations.is_empty() {
        return Some(Node::new(
            NodeKind::Constant(Meta::Void),
            block.line,
            block.column,
        ));
    }
    Some(Node::do_block(declarations))
}

macro_rules! arithmetic_builtin {
    ($name:ident, $op:expr, $symbol:literal) => {
        pub fn $name(env: &EnvRef, head: Node, block: &Term) -> Option<Node> {
            drop(head);
            let terms = block.block_terms();
            let mut params = Vec::new();
            for term in &terms[1..] {
                params.push(term.eval(env)?);
            }
            if params.is_empty() {
                err!(
                    Phase::Type,
                    block.line,
                    block.column,
                    concat!(
                        "No parameters provided to built-in function '",
                        $symbol,
                        "'."
                    )
                );
                return None;
            }
            Some(Node::new(
                NodeKind::Arith { op: $op, params },
                block.line,
                block.column,
            ))
        }
    };
}

arithmetic_builtin!(add, ArithOp::Add, "+");
arithmetic_builtin!(subtract, ArithOp::Sub, "-");
arithmetic_builtin!(multiply, ArithOp::Mul, "*");
arithmetic_builtin!(divide, ArithOp::Div, "/");
arithmetic_builtin!(modulo, ArithOp::Mod, "%");

/// The environment every program starts from: the named types and the
/// built-in macros, each typed `(any) -> any`.
pub fn create_root_env() -> EnvRef {
    let env = Env::new().into_shared();
    {
        let mut scope = env.borrow_mut();
        scope.enter("int", Meta::Type(*types::INT));
        scope.enter("float", Meta::Type(*types::FLOAT));
        scope.enter("type", Meta::Type(*types::TYPE));

        let builtin_type = types::function(vec![*types::ANY], *types::ANY);
        let natives: &[(&str, Builtin)] = &[
            ("let", define),
            ("lambda", lambda),
            ("quote", quote),
            ("do", do_block),
            ("array", arglist),
            ("+", add),
            ("-", subtract),
            ("*", multiply),
            ("/", divide),
            ("%", modulo),
        ];
        for (name, native) in natives {
            scope.enter(
                name,
                Meta::Function(builtin_type, Rc::new(MetaFunction::Builtin(*native))),
            );
        }
    }
    env
}
