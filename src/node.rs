//! The typed AST.
//!
//! A [`Node`] is what elaboration produces; evaluating a node yields a
//! [`Meta`]. Nodes own their children, except that a lambda's body is
//! shared (`Rc`) with every function value produced from it, and a lambda
//! exclusively owns the local environment it materializes on first
//! evaluation.

use std::cell::RefCell;
use std::rc::Rc;

use crate::env::{Env, EnvRef};
use crate::err;
use crate::errors::{self, Phase};
use crate::meta::{self, Meta, MetaFunction};
use crate::term::Term;
use crate::types::{self, Kind, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

pub enum NodeKind {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Boolean(bool),
    Variable(String),
    Constant(Meta),
    /// Reifies the stored term when evaluated.
    Quote(Term),
    /// Binds `names`; at least one of `ty` and `init` is present. Without
    /// an initializer the names bind to the unbound runtime placeholder.
    Define {
        ty: Option<Box<Node>>,
        names: Vec<String>,
        init: Option<Box<Node>>,
    },
    Do(Vec<Node>),
    /// A function literal. `local` is materialized on the first
    /// evaluation and holds the argument slots.
    Lambda {
        ret: Option<Box<Node>>,
        args: Vec<Node>,
        body: Rc<Node>,
        local: RefCell<Option<EnvRef>>,
    },
    Call {
        func: Box<Node>,
        args: Vec<Node>,
    },
    /// Left-to-right fold of one arithmetic operator over one or more
    /// operands; `-` and `/` have unary forms.
    Arith {
        op: ArithOp,
        params: Vec<Node>,
    },
}

pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    pub column: u32,
}

fn type_or_undefined(ty: Option<TypeRef>) -> String {
    match ty {
        Some(t) => format!("{t}"),
        None => "<undefined>".to_owned(),
    }
}

impl Node {
    pub fn new(kind: NodeKind, line: u32, column: u32) -> Self {
        Node { kind, line, column }
    }

    /// A `Do` node positioned at its first statement.
    pub fn do_block(body: Vec<Node>) -> Self {
        let (line, column) = body.first().map(|n| (n.line, n.column)).unwrap_or((0, 0));
        Node::new(NodeKind::Do(body), line, column)
    }

    /// Evaluate this node, producing a value or reporting and returning
    /// the absent value.
    pub fn eval(&self, env: &EnvRef) -> Meta {
        match &self.kind {
            NodeKind::Int(v) => Meta::Int(*types::INT, *v),
            NodeKind::Float(v) => Meta::Float(*types::FLOAT, *v),
            NodeKind::Str(s) => Meta::string(s.clone()),
            NodeKind::Char(c) => Meta::Char(*c),
            NodeKind::Boolean(b) => Meta::Bool(*b),
            NodeKind::Variable(name) => match env.borrow().lookup(name) {
                Some(meta) => meta,
                None => {
                    err!(
                        Phase::Type,
                        self.line,
                        self.column,
                        "Undefined variable '{name}'."
                    );
                    Meta::Undefined
                }
            },
            NodeKind::Constant(meta) => meta.clone(),
            NodeKind::Quote(term) => term.quote(),
            NodeKind::Define { ty, names, init } => self.eval_define(env, ty, names, init),
            NodeKind::Do(body) => {
                let mut last = Meta::Undefined;
                for node in body {
                    last = node.eval(env);
                }
                last
            }
            NodeKind::Lambda {
                ret,
                args,
                body,
                local,
            } => self.eval_lambda(env, ret, args, body, local),
            NodeKind::Call { func, args } => self.eval_call(env, func, args),
            NodeKind::Arith { op, params } => self.eval_arith(env, *op, params),
        }
    }

    fn eval_define(
        &self,
        env: &EnvRef,
        ty: &Option<Box<Node>>,
        names: &[String],
        init: &Option<Box<Node>>,
    ) -> Meta {
        let mut value = match init {
            Some(node) => node.eval(env),
            None => Meta::Undefined,
        };

        let declared: TypeRef;
        if let Some(type_node) = ty {
            let type_value = type_node.eval(env);
            let Meta::Type(t) = &type_value else {
                err!(
                    Phase::Type,
                    type_node.line,
                    type_node.column,
                    "Could not resolve definition type - expected '{}' but found '{}'.",
                    *types::TYPE,
                    type_or_undefined(type_value.ty())
                );
                return Meta::Undefined;
            };
            declared = *t;
        } else if value.is_present() {
            declared = value.ty().unwrap_or(*types::UNDEFINED);
        } else {
            err!(
                Phase::Type,
                self.line,
                self.column,
                "Neither an explicit type nor initializer were provided in definition."
            );
            return Meta::Undefined;
        }

        if value.is_present() {
            let value_type = value.ty().unwrap_or(*types::UNDEFINED);
            if !value_type.implicitly(declared) {
                let (line, column) = init
                    .as_ref()
                    .map(|n| (n.line, n.column))
                    .unwrap_or((self.line, self.column));
                err!(
                    Phase::Type,
                    line,
                    column,
                    "Could not convert initial value of type '{value_type}' to definition type '{declared}'."
                );
                return Meta::Undefined;
            }
        } else {
            value = Meta::unbound(declared);
        }

        let mut scope = env.borrow_mut();
        for name in names {
            scope.enter(name, value.clone());
        }
        value
    }

    fn eval_lambda(
        &self,
        env: &EnvRef,
        ret: &Option<Box<Node>>,
        args: &[Node],
        body: &Rc<Node>,
        local: &RefCell<Option<EnvRef>>,
    ) -> Meta {
        if local.borrow().is_none() {
            let fresh = Env::with_parent(env).into_shared();
            for arg in args {
                arg.eval(&fresh);
            }
            *local.borrow_mut() = Some(fresh);
        }
        let Some(local_env) = local.borrow().clone() else {
            return Meta::Undefined;
        };

        // the unbound entries at the head of the entry order are the
        // argument slots
        let mut arg_types = Vec::new();
        {
            let scope = local_env.borrow();
            for i in 0..scope.len() {
                match scope.entry(i) {
                    Some(Meta::Runtime(t, None)) => {
                        arg_types.push(t.inner().unwrap_or(*types::ANY));
                    }
                    _ => break,
                }
            }
        }

        let mut ret_type: TypeRef;
        if let Some(ret_node) = ret {
            let type_value = ret_node.eval(env);
            let Meta::Type(t) = &type_value else {
                err!(
                    Phase::Type,
                    ret_node.line,
                    ret_node.column,
                    "Could not resolve return type - expected '{}' but found '{}'.",
                    *types::TYPE,
                    type_or_undefined(type_value.ty())
                );
                return Meta::Undefined;
            };
            ret_type = *t;
        } else {
            // infer by evaluating the body speculatively against the
            // unbound argument slots
            errors::catch_errors();
            let result = body.eval(&local_env);
            if let Some(t) = result.ty() {
                errors::discard_errors();
                ret_type = t;
            } else {
                errors::release_errors();
                err!(
                    Phase::Type,
                    body.line,
                    body.column,
                    "Could not infer return type from function body."
                );
                return Meta::Undefined;
            }
        }
        if ret_type.kind() == Kind::Runtime {
            ret_type = ret_type.inner().unwrap_or(ret_type);
        }

        let captured = local_env.borrow().fork();
        captured.borrow_mut().set_parent(Some(env.clone()));
        let mut slots = Vec::new();
        {
            let scope = captured.borrow();
            for i in 0..scope.len() {
                match scope.entry(i) {
                    Some(Meta::Runtime(_, None)) => slots.push(i),
                    _ => break,
                }
            }
        }

        Meta::Function(
            types::function(arg_types, ret_type),
            Rc::new(MetaFunction::Closure {
                body: body.clone(),
                args: slots,
                local: captured,
            }),
        )
    }

    fn eval_call(&self, env: &EnvRef, func: &Node, args: &[Node]) -> Meta {
        let callee = func.eval(env);
        let Meta::Function(func_type, implementation) = &callee else {
            err!(
                Phase::Type,
                func.line,
                func.column,
                "Could not resolve function to be called."
            );
            return Meta::Undefined;
        };
        let MetaFunction::Closure {
            body,
            args: slots,
            local,
        } = &**implementation
        else {
            err!(
                Phase::Type,
                func.line,
                func.column,
                "Could not resolve function to be called."
            );
            return Meta::Undefined;
        };
        let Some((expected, _)) = func_type.signature() else {
            return Meta::Undefined;
        };

        if expected.len() != args.len() {
            err!(
                Phase::Type,
                self.line,
                self.column,
                "Incorrect number of arguments: expected {}, found {}.",
                expected.len(),
                args.len()
            );
            return Meta::Undefined;
        }

        for (i, arg) in args.iter().enumerate() {
            let value = arg.eval(env);
            let Some(value_type) = value.ty() else {
                return Meta::Undefined;
            };
            if !value_type.implicitly(expected[i]) {
                err!(
                    Phase::Type,
                    arg.line,
                    arg.column,
                    "Incorrect argument type: expected '{}', but found '{}'.",
                    expected[i],
                    value_type
                );
                return Meta::Undefined;
            }
            if let Some(&slot) = slots.get(i) {
                local.borrow_mut().set_entry(slot, value);
            }
        }

        body.eval(local)
    }

    fn eval_arith(&self, env: &EnvRef, op: ArithOp, params: &[Node]) -> Meta {
        let Some(first) = params.first() else {
            return Meta::Undefined;
        };
        let mut value = first.eval(env);

        if params.len() == 1 {
            match op {
                ArithOp::Sub => {
                    // unary negation
                    return if value.is_int() {
                        meta::sub(&Meta::Int(*types::INT, 0), &value)
                    } else {
                        meta::sub(&Meta::Float(*types::FLOAT, 0.0), &value)
                    };
                }
                ArithOp::Div => {
                    // unary reciprocal
                    return if value.is_int() {
                        meta::div(&Meta::Int(*types::INT, 1), &value)
                    } else {
                        meta::div(&Meta::Float(*types::FLOAT, 1.0), &value)
                    };
                }
                _ => {}
            }
        }

        for param in &params[1..] {
            let rhs = param.eval(env);
            value = match op {
                ArithOp::Add => meta::add(&value, &rhs),
                ArithOp::Sub => meta::sub(&value, &rhs),
                ArithOp::Mul => meta::mul(&value, &rhs),
                ArithOp::Div => meta::div(&value, &rhs),
                ArithOp::Mod => meta::modulo(&value, &rhs),
            };
        }
        value
    }
}
