//! Compile-time values.
//!
//! A [`Meta`] is a tagged value: a type handle plus a payload chosen by
//! that type's kind. Scalar payloads are stored inline; strings, arrays,
//! sum inhabitants, intersect members, and functions hold shared-ownership
//! [`Rc`] payloads, so copying a `Meta` is cheap and [`Meta::clone_deep`]
//! is the explicit deep copy.
//!
//! `Meta::Undefined` is the *absent* value: it carries no type, converts
//! to false, and doubles as the error signal - producers report a
//! diagnostic and return it, consumers check and short-circuit.
//!
//! A `Meta::Runtime` with no node payload is the *unbound placeholder*: it
//! marks a lambda argument slot and keeps arithmetic symbolic (an
//! operation over a placeholder yields another placeholder of the joined
//! type).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::{LazyLock, Mutex, PoisonError};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner, Symbol};

use crate::builtins::Builtin;
use crate::env::EnvRef;
use crate::node::Node;
use crate::types::{self, Kind, TypeRef};

static SYMBOLS: LazyLock<Mutex<StringInterner<DefaultBackend>>> =
    LazyLock::new(|| Mutex::new(StringInterner::new()));

/// The id for `name`, assigning the next integer on first mention.
pub fn find_symbol(name: &str) -> i64 {
    SYMBOLS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_intern(name)
        .to_usize() as i64
}

/// The name behind a symbol id; empty for ids never assigned.
pub fn symbol_name(id: i64) -> String {
    let interner = SYMBOLS.lock().unwrap_or_else(PoisonError::into_inner);
    usize::try_from(id)
        .ok()
        .and_then(DefaultSymbol::try_from_usize)
        .and_then(|sym| interner.resolve(sym))
        .unwrap_or("")
        .to_owned()
}

/// The payload of a function-typed value.
pub enum MetaFunction {
    /// A native block-head macro.
    Builtin(Builtin),
    /// A user closure: the body node, the argument slot indices into the
    /// captured local environment, and that environment.
    Closure {
        body: Rc<Node>,
        args: Vec<usize>,
        local: EnvRef,
    },
}

/// A compile-time value. The active variant is determined by the type's
/// kind (plus the number type's floating flag); [`Meta::ty`] reports the
/// type, `None` for the absent value.
#[derive(Clone)]
pub enum Meta {
    /// No value; also the error signal.
    Undefined,
    Void,
    Int(TypeRef, i64),
    Float(TypeRef, f64),
    Char(char),
    Bool(bool),
    /// A type used as a value; the tag is the `type` type.
    Type(TypeRef),
    Symbol(i64),
    Str(Rc<String>),
    Array(TypeRef, Rc<Vec<Meta>>),
    /// A sum-typed value wrapping its single inhabitant.
    Union(TypeRef, Rc<Meta>),
    /// An intersect-typed value holding one member value per member type,
    /// in the type's canonical member order.
    Intersect(TypeRef, Rc<Vec<Meta>>),
    Function(TypeRef, Rc<MetaFunction>),
    /// A deferred value; `None` is the unbound placeholder marking a
    /// lambda argument slot.
    Runtime(TypeRef, Option<Rc<Node>>),
}

impl Meta {
    pub fn string(s: impl Into<String>) -> Meta {
        Meta::Str(Rc::new(s.into()))
    }

    pub fn symbol(name: &str) -> Meta {
        Meta::Symbol(find_symbol(name))
    }

    /// The unbound runtime placeholder of the given inner type.
    pub fn unbound(inner: TypeRef) -> Meta {
        Meta::Runtime(types::runtime(inner), None)
    }

    /// The value's type; `None` for the absent value.
    pub fn ty(&self) -> Option<TypeRef> {
        match self {
            Meta::Undefined => None,
            Meta::Void => Some(*types::VOID),
            Meta::Int(t, _) | Meta::Float(t, _) => Some(*t),
            Meta::Char(_) => Some(*types::CHAR),
            Meta::Bool(_) => Some(*types::BOOL),
            Meta::Type(_) => Some(*types::TYPE),
            Meta::Symbol(_) => Some(*types::SYMBOL),
            Meta::Str(_) => Some(*types::STRING),
            Meta::Array(t, _)
            | Meta::Union(t, _)
            | Meta::Intersect(t, _)
            | Meta::Function(t, _)
            | Meta::Runtime(t, _) => Some(*t),
        }
    }

    /// False only for the absent value.
    pub fn is_present(&self) -> bool {
        !matches!(self, Meta::Undefined)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Meta::Int(..))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Meta::Float(..))
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Meta::Type(_))
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, Meta::Symbol(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Meta::Array(..))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Meta::Function(..))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Meta::Runtime(..))
    }

    /// True for a runtime value with no node: a lambda argument slot.
    pub fn is_unbound(&self) -> bool {
        matches!(self, Meta::Runtime(_, None))
    }

    /// The native macro behind a builtin function value, if any.
    pub fn builtin(&self) -> Option<Builtin> {
        if let Meta::Function(_, f) = self
            && let MetaFunction::Builtin(b) = &**f
        {
            Some(*b)
        } else {
            None
        }
    }

    /// Deep copy: refcounted payloads are duplicated (arrays and
    /// intersects element-wise, closures with a forked environment);
    /// inline payloads copy trivially.
    pub fn clone_deep(&self) -> Meta {
        match self {
            Meta::Str(s) => Meta::Str(Rc::new((**s).clone())),
            Meta::Array(t, vals) => {
                Meta::Array(*t, Rc::new(vals.iter().map(Meta::clone_deep).collect()))
            }
            Meta::Union(t, v) => Meta::Union(*t, Rc::new((**v).clone())),
            Meta::Intersect(t, vals) => {
                Meta::Intersect(*t, Rc::new(vals.iter().map(Meta::clone_deep).collect()))
            }
            Meta::Function(t, f) => match &**f {
                MetaFunction::Closure { body, args, local } => Meta::Function(
                    *t,
                    Rc::new(MetaFunction::Closure {
                        body: body.clone(),
                        args: args.clone(),
                        local: local.borrow().fork(),
                    }),
                ),
                MetaFunction::Builtin(b) => Meta::Function(*t, Rc::new(MetaFunction::Builtin(*b))),
            },
            other => other.clone(),
        }
    }
}

impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        if self.ty() != other.ty() {
            return false;
        }
        match (self, other) {
            (Meta::Undefined, Meta::Undefined) | (Meta::Void, Meta::Void) => true,
            (Meta::Int(_, a), Meta::Int(_, b)) => a == b,
            (Meta::Float(_, a), Meta::Float(_, b)) => a == b,
            (Meta::Char(a), Meta::Char(b)) => a == b,
            (Meta::Bool(a), Meta::Bool(b)) => a == b,
            (Meta::Type(a), Meta::Type(b)) => a == b,
            (Meta::Symbol(a), Meta::Symbol(b)) => a == b,
            (Meta::Str(a), Meta::Str(b)) => a == b,
            (Meta::Array(_, a), Meta::Array(_, b)) | (Meta::Intersect(_, a), Meta::Intersect(_, b)) => {
                a == b
            }
            (Meta::Union(_, a), Meta::Union(_, b)) => a == b,
            (Meta::Function(_, a), Meta::Function(_, b)) => match (&**a, &**b) {
                (MetaFunction::Builtin(x), MetaFunction::Builtin(y)) => {
                    std::ptr::fn_addr_eq(*x, *y)
                }
                (
                    MetaFunction::Closure { body: x, .. },
                    MetaFunction::Closure { body: y, .. },
                ) => Rc::ptr_eq(x, y),
                _ => false,
            },
            (Meta::Runtime(_, a), Meta::Runtime(_, b)) => match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => Rc::ptr_eq(x, y),
                _ => false,
            },
            _ => false,
        }
    }
}

impl Hash for Meta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty().hash(state);
        match self {
            Meta::Undefined | Meta::Void => {}
            Meta::Int(_, v) => v.hash(state),
            Meta::Float(_, v) => v.to_bits().hash(state),
            Meta::Char(c) => c.hash(state),
            Meta::Bool(b) => b.hash(state),
            Meta::Type(t) => t.hash(state),
            Meta::Symbol(id) => id.hash(state),
            Meta::Str(s) => s.hash(state),
            Meta::Array(_, vals) | Meta::Intersect(_, vals) => {
                for v in vals.iter() {
                    v.hash(state);
                }
            }
            Meta::Union(_, v) => v.hash(state),
            Meta::Function(_, f) => match &**f {
                MetaFunction::Builtin(b) => (*b as *const ()).hash(state),
                MetaFunction::Closure { body, .. } => Rc::as_ptr(body).hash(state),
            },
            Meta::Runtime(_, node) => node.as_ref().map(Rc::as_ptr).hash(state),
        }
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Meta::Undefined => write!(f, "<undefined>"),
            Meta::Void => write!(f, "()"),
            Meta::Int(_, v) => write!(f, "{v}"),
            Meta::Float(_, v) => write!(f, "{v:?}"),
            Meta::Char(c) => write!(f, "{c}"),
            Meta::Bool(b) => write!(f, "{b}"),
            Meta::Type(t) => write!(f, "{t}"),
            Meta::Symbol(id) => write!(f, "{}", symbol_name(*id)),
            Meta::Str(s) => write!(f, "{s}"),
            Meta::Array(_, vals) => {
                write!(f, "[")?;
                for (i, v) in vals.iter().enumerate() {
                    write!(f, "{}{v}", if i == 0 { "" } else { " " })?;
                }
                write!(f, "]")
            }
            Meta::Union(_, v) => write!(f, "{v}"),
            Meta::Intersect(_, vals) => {
                write!(f, "(&")?;
                for v in vals.iter() {
                    write!(f, " {v}")?;
                }
                write!(f, ")")
            }
            Meta::Function(..) => write!(f, "<function>"),
            Meta::Runtime(..) => write!(f, "<unknown>"),
        }
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty() {
            Some(t) => write!(f, "{self} : {t}"),
            None => write!(f, "<undefined>"),
        }
    }
}

/// Reduce a 64-bit result to the destination type's width, keeping the
/// sign of the narrowed bits.
pub fn trunc(n: i64, dest: TypeRef) -> i64 {
    match dest.size() {
        1 => n as i8 as i64,
        2 => n as i16 as i64,
        4 => n as i32 as i64,
        _ => n,
    }
}

fn to_float(m: &Meta) -> f64 {
    match m {
        Meta::Float(_, d) => *d,
        Meta::Int(_, i) => *i as f64,
        _ => 0.0,
    }
}

fn to_int(m: &Meta) -> i64 {
    match m {
        Meta::Int(_, i) => *i,
        Meta::Float(_, d) => *d as i64,
        _ => 0,
    }
}

fn join_types(lhs: &Meta, rhs: &Meta) -> Option<TypeRef> {
    types::join(lhs.ty()?, rhs.ty()?)
}

/// If the joined type is runtime and either operand is the unbound
/// placeholder, the result is the unbound placeholder of the joined type.
fn runtime_result(dst: TypeRef, lhs: &Meta, rhs: &Meta) -> Option<Meta> {
    if dst.kind() == Kind::Runtime && (lhs.is_unbound() || rhs.is_unbound()) {
        Some(Meta::Runtime(dst, None))
    } else {
        None
    }
}

pub fn add(lhs: &Meta, rhs: &Meta) -> Meta {
    let Some(dst) = join_types(lhs, rhs) else {
        return Meta::Undefined;
    };
    if let Some(deferred) = runtime_result(dst, lhs, rhs) {
        return deferred;
    }
    if dst.is_floating() {
        Meta::Float(dst, to_float(lhs) + to_float(rhs))
    } else if dst.kind() == Kind::Number {
        Meta::Int(dst, trunc(to_int(lhs).wrapping_add(to_int(rhs)), dst))
    } else if dst == *types::STRING {
        match (lhs, rhs) {
            (Meta::Str(l), Meta::Str(r)) => Meta::string(format!("{l}{r}")),
            _ => Meta::Undefined,
        }
    } else {
        Meta::Undefined
    }
}

macro_rules! numeric_op {
    ($name:ident, $int_op:ident, $float_op:tt) => {
        pub fn $name(lhs: &Meta, rhs: &Meta) -> Meta {
            let Some(dst) = join_types(lhs, rhs) else {
                return Meta::Undefined;
            };
            if let Some(deferred) = runtime_result(dst, lhs, rhs) {
                return deferred;
            }
            if dst.is_floating() {
                Meta::Float(dst, to_float(lhs) $float_op to_float(rhs))
            } else if dst.kind() == Kind::Number {
                Meta::Int(dst, trunc(to_int(lhs).$int_op(to_int(rhs)), dst))
            } else {
                Meta::Undefined
            }
        }
    };
}

numeric_op!(sub, wrapping_sub, -);
numeric_op!(mul, wrapping_mul, *);

pub fn div(lhs: &Meta, rhs: &Meta) -> Meta {
    let Some(dst) = join_types(lhs, rhs) else {
        return Meta::Undefined;
    };
    if let Some(deferred) = runtime_result(dst, lhs, rhs) {
        return deferred;
    }
    if dst.is_floating() {
        Meta::Float(dst, to_float(lhs) / to_float(rhs))
    } else if dst.kind() == Kind::Number {
        match to_int(lhs).checked_div(to_int(rhs)) {
            Some(q) => Meta::Int(dst, trunc(q, dst)),
            None => Meta::Undefined,
        }
    } else {
        Meta::Undefined
    }
}

/// Modulo; floored on floats (`l − r·floor(l/r)`), truncating on integers.
pub fn modulo(lhs: &Meta, rhs: &Meta) -> Meta {
    let Some(dst) = join_types(lhs, rhs) else {
        return Meta::Undefined;
    };
    if let Some(deferred) = runtime_result(dst, lhs, rhs) {
        return deferred;
    }
    if dst.is_floating() {
        let (l, r) = (to_float(lhs), to_float(rhs));
        Meta::Float(dst, l - r * (l / r).floor())
    } else if dst.kind() == Kind::Number {
        match to_int(lhs).checked_rem(to_int(rhs)) {
            Some(r) => Meta::Int(dst, trunc(r, dst)),
            None => Meta::Undefined,
        }
    } else {
        Meta::Undefined
    }
}

macro_rules! boolean_op {
    ($name:ident, $op:tt) => {
        pub fn $name(lhs: &Meta, rhs: &Meta) -> Meta {
            match (lhs, rhs) {
                (Meta::Bool(a), Meta::Bool(b)) => Meta::Bool(*a $op *b),
                _ => Meta::Undefined,
            }
        }
    };
}

boolean_op!(and, &&);
boolean_op!(or, ||);
boolean_op!(xor, ^);

pub fn not(operand: &Meta) -> Meta {
    match operand {
        Meta::Bool(b) => Meta::Bool(!b),
        _ => Meta::Undefined,
    }
}

pub fn equal(lhs: &Meta, rhs: &Meta) -> Meta {
    if !lhs.is_present() || !rhs.is_present() {
        return Meta::Undefined;
    }
    Meta::Bool(lhs == rhs)
}

pub fn inequal(lhs: &Meta, rhs: &Meta) -> Meta {
    if !lhs.is_present() || !rhs.is_present() {
        return Meta::Undefined;
    }
    Meta::Bool(lhs != rhs)
}

macro_rules! comparison_op {
    ($name:ident, $op:tt) => {
        pub fn $name(lhs: &Meta, rhs: &Meta) -> Meta {
            let Some(dst) = join_types(lhs, rhs) else {
                return Meta::Undefined;
            };
            if dst.is_floating() {
                Meta::Bool(to_float(lhs) $op to_float(rhs))
            } else if dst.kind() == Kind::Number {
                Meta::Bool(to_int(lhs) $op to_int(rhs))
            } else if dst == *types::STRING {
                match (lhs, rhs) {
                    (Meta::Str(l), Meta::Str(r)) => Meta::Bool(l $op r),
                    _ => Meta::Undefined,
                }
            } else {
                Meta::Undefined
            }
        }
    };
}

comparison_op!(less, <);
comparison_op!(lessequal, <=);
comparison_op!(greater, >);
comparison_op!(greaterequal, >=);

/// Union construction over values; intentionally unimplemented.
pub fn unionf(_lhs: &Meta, _rhs: &Meta) -> Meta {
    Meta::Undefined
}

/// Intersect construction over values; intentionally unimplemented.
pub fn intersect(_lhs: &Meta, _rhs: &Meta) -> Meta {
    Meta::Undefined
}

/// Value copy replacing the destination.
pub fn assign(dst: &mut Meta, src: &Meta) {
    *dst = src.clone();
}

/// Cast to `dst`; requires explicit convertibility, converts numbers, and
/// yields no value for anything else.
pub fn cast(m: &Meta, dst: TypeRef) -> Meta {
    let Some(t) = m.ty() else {
        return Meta::Undefined;
    };
    if !t.explicitly(dst) {
        return Meta::Undefined;
    }
    if dst.is_floating() {
        Meta::Float(dst, to_float(m))
    } else if dst.kind() == Kind::Number {
        Meta::Int(dst, trunc(to_int(m), dst))
    } else {
        Meta::Undefined
    }
}
