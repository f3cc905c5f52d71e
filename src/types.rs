//! The interned type lattice.
//!
//! Every value carries a type drawn from nine kinds. Types are interned
//! process-wide, keyed by a canonical *mangle* string, and live for the
//! lifetime of the process; [`TypeRef`] handles are non-owning and compare
//! by pointer, so type equality is a pointer comparison.
//!
//! Conversions come in two strengths. `implicitly` asks whether a value of
//! one type may appear where another is expected (identity, `any`, sum
//! membership, matching int/float family, sized-to-unsized arrays, and
//! transparent runtime wrappers). `explicitly` additionally allows number
//! casts, intersect projection, and named-type unwrapping. [`join`]
//! computes the common type that drives arithmetic promotion.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, Mutex, PoisonError};

/// The nine kinds of type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Type,
    Number,
    Function,
    Macro,
    Array,
    Sum,
    Intersect,
    Named,
    Runtime,
}

#[derive(Debug)]
enum Repr {
    /// A bare base type of a given size; the building block the named
    /// built-ins wrap.
    Base,
    Number {
        floating: bool,
    },
    Function {
        args: Vec<TypeRef>,
        ret: TypeRef,
    },
    Macro {
        args: Vec<TypeRef>,
        ret: TypeRef,
    },
    Array {
        element: TypeRef,
        /// Element count; -1 marks an unsized array.
        count: i64,
    },
    Sum {
        members: Vec<TypeRef>,
    },
    Intersect {
        members: Vec<TypeRef>,
    },
    Named {
        name: String,
        inner: TypeRef,
    },
    Runtime {
        inner: TypeRef,
    },
}

/// An interned type: a byte size plus kind-specific structure.
#[derive(Debug)]
pub struct Type {
    size: u32,
    repr: Repr,
}

/// A non-owning handle to an interned [`Type`]. Compares by pointer.
#[derive(Debug, Clone, Copy)]
pub struct TypeRef(&'static Type);

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::from_ref(self.0).hash(state);
    }
}

impl Deref for TypeRef {
    type Target = Type;

    fn deref(&self) -> &Type {
        self.0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static REGISTRY: LazyLock<Mutex<HashMap<String, &'static Type>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Return the unique interned type for `ty`, minting it on first use.
fn intern(ty: Type) -> TypeRef {
    let key = ty.mangle();
    let mut registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = registry.get(key.as_str()) {
        return TypeRef(existing);
    }
    let leaked: &'static Type = Box::leak(Box::new(ty));
    registry.insert(key, leaked);
    TypeRef(leaked)
}

/// A bare base type of `size` bytes.
pub fn base(size: u32) -> TypeRef {
    intern(Type {
        size,
        repr: Repr::Base,
    })
}

/// An integer or floating-point number type of `size` bytes.
pub fn number(size: u32, floating: bool) -> TypeRef {
    intern(Type {
        size,
        repr: Repr::Number { floating },
    })
}

/// A function type; the size is that of a callable handle.
pub fn function(args: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
    intern(Type {
        size: 8,
        repr: Repr::Function { args, ret },
    })
}

/// A macro type; macros occupy no storage.
pub fn macro_type(args: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
    intern(Type {
        size: 0,
        repr: Repr::Macro { args, ret },
    })
}

/// An array type; `count` of -1 makes it unsized.
pub fn array(element: TypeRef, count: i64) -> TypeRef {
    let size = if count > -1 {
        element.size() * count as u32
    } else {
        8
    };
    intern(Type {
        size,
        repr: Repr::Array { element, count },
    })
}

/// Deduplicate members and order them by mangle so the intern key is
/// canonical regardless of the order the caller discovered them in.
fn canonical_members(mut members: Vec<TypeRef>) -> Vec<TypeRef> {
    members.sort_by_key(|m| m.mangle());
    members.dedup();
    members
}

/// A sum type; its size is the sum of its members' sizes.
pub fn sum(members: Vec<TypeRef>) -> TypeRef {
    let members = canonical_members(members);
    let size = members.iter().map(|m| m.size()).sum();
    intern(Type {
        size,
        repr: Repr::Sum { members },
    })
}

/// An intersect type; its size is the largest of its members' sizes.
pub fn intersect(members: Vec<TypeRef>) -> TypeRef {
    let members = canonical_members(members);
    let size = members.iter().map(|m| m.size()).max().unwrap_or(0);
    intern(Type {
        size,
        repr: Repr::Intersect { members },
    })
}

/// A named wrapper sharing its inner type's size.
pub fn named(name: &str, inner: TypeRef) -> TypeRef {
    intern(Type {
        size: inner.size(),
        repr: Repr::Named {
            name: name.to_owned(),
            inner,
        },
    })
}

/// A runtime wrapper marking a deferred value of the inner type.
pub fn runtime(inner: TypeRef) -> TypeRef {
    intern(Type {
        size: inner.size(),
        repr: Repr::Runtime { inner },
    })
}

pub static INT: LazyLock<TypeRef> = LazyLock::new(|| number(8, false));
pub static FLOAT: LazyLock<TypeRef> = LazyLock::new(|| number(8, true));
pub static STRING: LazyLock<TypeRef> = LazyLock::new(|| named("string", base(8)));
pub static CHAR: LazyLock<TypeRef> = LazyLock::new(|| named("char", base(4)));
pub static SYMBOL: LazyLock<TypeRef> = LazyLock::new(|| named("symbol", base(8)));
pub static ANY: LazyLock<TypeRef> = LazyLock::new(|| named("any", base(0)));
pub static VOID: LazyLock<TypeRef> = LazyLock::new(|| named("void", base(0)));
pub static TYPE: LazyLock<TypeRef> = LazyLock::new(|| named("type", base(4)));
pub static BOOL: LazyLock<TypeRef> = LazyLock::new(|| named("bool", base(1)));
pub static UNDEFINED: LazyLock<TypeRef> = LazyLock::new(|| named("undefined", base(0)));

impl Type {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn kind(&self) -> Kind {
        match self.repr {
            Repr::Base => Kind::Type,
            Repr::Number { .. } => Kind::Number,
            Repr::Function { .. } => Kind::Function,
            Repr::Macro { .. } => Kind::Macro,
            Repr::Array { .. } => Kind::Array,
            Repr::Sum { .. } => Kind::Sum,
            Repr::Intersect { .. } => Kind::Intersect,
            Repr::Named { .. } => Kind::Named,
            Repr::Runtime { .. } => Kind::Runtime,
        }
    }

    /// True for floating-point number types.
    pub fn is_floating(&self) -> bool {
        matches!(self.repr, Repr::Number { floating: true })
    }

    /// True for integer number types.
    pub fn is_integer(&self) -> bool {
        matches!(self.repr, Repr::Number { floating: false })
    }

    /// The inner type of a named or runtime wrapper.
    pub fn inner(&self) -> Option<TypeRef> {
        match &self.repr {
            Repr::Named { inner, .. } | Repr::Runtime { inner } => Some(*inner),
            _ => None,
        }
    }

    /// The display name of a named type.
    pub fn name(&self) -> Option<&str> {
        match &self.repr {
            Repr::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Argument and return types of a function or macro type.
    pub fn signature(&self) -> Option<(&[TypeRef], TypeRef)> {
        match &self.repr {
            Repr::Function { args, ret } | Repr::Macro { args, ret } => Some((args, *ret)),
            _ => None,
        }
    }

    /// Element type and count of an array type.
    pub fn element(&self) -> Option<(TypeRef, i64)> {
        match &self.repr {
            Repr::Array { element, count } => Some((*element, *count)),
            _ => None,
        }
    }

    /// Member types of a sum or intersect type, in canonical order.
    pub fn members(&self) -> Option<&[TypeRef]> {
        match &self.repr {
            Repr::Sum { members } | Repr::Intersect { members } => Some(members),
            _ => None,
        }
    }

    /// The canonical intern key.
    pub fn mangle(&self) -> String {
        match &self.repr {
            Repr::Base => format!("@{}", self.size * 8),
            Repr::Number { floating } => {
                format!("{}{}", if *floating { "F" } else { "I" }, self.size * 8)
            }
            Repr::Function { args, ret } => format!("L{}({})", ret.mangle(), mangle_list(args)),
            Repr::Macro { args, ret } => format!("M{}({})", ret.mangle(), mangle_list(args)),
            Repr::Array { element, count } => {
                if *count > -1 {
                    format!("A{}[{}]", element.mangle(), count)
                } else {
                    format!("A{}[]", element.mangle())
                }
            }
            Repr::Sum { members } => format!("|({})", mangle_list(members)),
            Repr::Intersect { members } => format!("&({})", mangle_list(members)),
            Repr::Named { name, inner } => format!("N{}{}", name, inner.mangle()),
            Repr::Runtime { inner } => format!("?{}", inner.mangle()),
        }
    }
}

fn mangle_list(types: &[TypeRef]) -> String {
    types
        .iter()
        .map(|t| t.mangle())
        .collect::<Vec<_>>()
        .join(",")
}

impl TypeRef {
    /// Rules shared by every kind: identity, `any`, a runtime wrapper
    /// around this exact type, and membership in a sum.
    fn base_implicitly(self, other: TypeRef) -> bool {
        if self == other || other == *ANY {
            return true;
        }
        if other.kind() == Kind::Runtime && other.inner() == Some(self) {
            return true;
        }
        other.kind() == Kind::Sum && other.members().is_some_and(|m| m.contains(&self))
    }

    /// Can a value of this type appear where `other` is expected?
    pub fn implicitly(self, other: TypeRef) -> bool {
        // runtime wrappers are transparent for compatibility
        if let Repr::Runtime { inner } = &self.0.repr {
            return inner.implicitly(other);
        }
        if self.base_implicitly(other) {
            return true;
        }
        match &self.0.repr {
            Repr::Number { floating } => {
                other.kind() == Kind::Number && other.is_floating() == *floating
            }
            Repr::Array { element, .. } => {
                other.element().is_some_and(|(e, n)| n == -1 && e == *element)
            }
            Repr::Intersect { members } => members.contains(&other),
            _ => false,
        }
    }

    /// Can a value of this type be cast to `other`?
    pub fn explicitly(self, other: TypeRef) -> bool {
        match &self.0.repr {
            Repr::Runtime { inner } => inner.explicitly(other),
            Repr::Number { .. } => self.implicitly(other) || other.kind() == Kind::Number,
            Repr::Sum { members } => self.implicitly(other) || members.contains(&other),
            Repr::Named { inner, .. } => self.implicitly(other) || inner.explicitly(other),
            _ => self.implicitly(other),
        }
    }
}

/// The common type of two operands, driving binary-op promotion.
///
/// Undefined poisons; identity wins; a runtime side absorbs a compatible
/// concrete side; implicit conversion picks the admitting side; joining an
/// integer with a float lands on the float; explicit conversion is the
/// last resort. `None` means the types cannot meet and the caller reports.
pub fn join(a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    if a == *UNDEFINED || b == *UNDEFINED {
        return Some(*UNDEFINED);
    }
    if a == b {
        return Some(a);
    }
    if b.kind() == Kind::Runtime && a.implicitly(b) {
        return Some(b);
    }
    if a.kind() == Kind::Runtime && b.implicitly(a) {
        return Some(a);
    }
    if a.implicitly(b) {
        return Some(b);
    }
    if b.implicitly(a) {
        return Some(a);
    }
    if a.kind() == Kind::Number && b.kind() == Kind::Number {
        return Some(if a.is_floating() { a } else { b });
    }
    if a.explicitly(b) {
        return Some(b);
    }
    if b.explicitly(a) {
        return Some(a);
    }
    None
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Base => write!(f, "@{}", self.size * 8),
            Repr::Number { floating } => {
                write!(f, "{}{}", if *floating { "f" } else { "i" }, self.size * 8)
            }
            Repr::Function { args, ret } => {
                write!(f, "(function")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, " -> {ret})")
            }
            Repr::Macro { args, ret } => {
                write!(f, "(macro")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, " -> {ret})")
            }
            Repr::Array { element, count } => {
                if *count > -1 {
                    write!(f, "({element} [{count}])")
                } else {
                    write!(f, "({element} [])")
                }
            }
            Repr::Sum { members } => {
                write!(f, "(union")?;
                for member in members {
                    write!(f, " {member}")?;
                }
                write!(f, ")")
            }
            Repr::Intersect { members } => {
                write!(f, "(intersect")?;
                for member in members {
                    write!(f, " {member}")?;
                }
                write!(f, ")")
            }
            Repr::Named { name, .. } => write!(f, "{name}"),
            Repr::Runtime { inner } => write!(f, "(runtime {inner})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_returns_the_same_handle() {
        assert_eq!(number(8, false), *INT);
        assert_eq!(number(8, true), *FLOAT);
        assert_eq!(named("string", base(8)), *STRING);
        assert_eq!(
            function(vec![*INT, *FLOAT], *STRING),
            function(vec![*INT, *FLOAT], *STRING)
        );
        assert_eq!(array(*INT, 3), array(*INT, 3));
        assert_eq!(runtime(*INT), runtime(*INT));
        assert_ne!(array(*INT, 3), array(*INT, 4));
        assert_ne!(*INT, *FLOAT);
        assert_ne!(number(4, false), *INT);
    }

    #[test]
    fn test_member_order_is_canonical() {
        assert_eq!(
            sum(vec![*INT, *STRING, *FLOAT]),
            sum(vec![*STRING, *FLOAT, *INT])
        );
        assert_eq!(sum(vec![*INT, *INT, *FLOAT]), sum(vec![*FLOAT, *INT]));
        assert_eq!(
            intersect(vec![*BOOL, *CHAR]),
            intersect(vec![*CHAR, *BOOL, *CHAR])
        );
    }

    #[test]
    fn test_mangles() {
        let cases: Vec<(TypeRef, &str)> = vec![
            (base(4), "@32"),
            (*INT, "I64"),
            (*FLOAT, "F64"),
            (number(1, false), "I8"),
            (*STRING, "Nstring@64"),
            (function(vec![*INT, *FLOAT], *STRING), "LNstring@64(I64,F64)"),
            (function(vec![], *INT), "LI64()"),
            (macro_type(vec![*ANY], *ANY), "MNany@0(Nany@0)"),
            (array(*INT, 3), "AI64[3]"),
            (array(*INT, -1), "AI64[]"),
            (sum(vec![*FLOAT, *INT]), "|(F64,I64)"),
            (intersect(vec![*FLOAT, *INT]), "&(F64,I64)"),
            (runtime(*INT), "?I64"),
        ];
        for (i, (ty, expected)) in cases.iter().enumerate() {
            assert_eq!(ty.mangle(), *expected, "mangle case #{}", i + 1);
        }
    }

    #[test]
    fn test_display() {
        let cases: Vec<(TypeRef, &str)> = vec![
            (*INT, "i64"),
            (*FLOAT, "f64"),
            (number(2, false), "i16"),
            (*STRING, "string"),
            (*SYMBOL, "symbol"),
            (*ANY, "any"),
            (base(4), "@32"),
            (
                function(vec![*INT, *INT], *FLOAT),
                "(function i64 i64 -> f64)",
            ),
            (macro_type(vec![*ANY], *ANY), "(macro any -> any)"),
            (array(*INT, 3), "(i64 [3])"),
            (array(*STRING, -1), "(string [])"),
            (sum(vec![*INT, *SYMBOL]), "(union i64 symbol)"),
            (intersect(vec![*INT, *FLOAT]), "(intersect f64 i64)"),
            (runtime(*INT), "(runtime i64)"),
        ];
        for (i, (ty, expected)) in cases.iter().enumerate() {
            assert_eq!(format!("{ty}"), *expected, "display case #{}", i + 1);
        }
    }

    #[test]
    fn test_implicit_conversions() {
        let cases: Vec<(TypeRef, TypeRef, bool)> = vec![
            // identity and any
            (*INT, *INT, true),
            (*INT, *ANY, true),
            (*STRING, *ANY, true),
            // number families convert within themselves only
            (*INT, number(1, false), true),
            (number(1, false), *INT, true),
            (*FLOAT, number(4, true), true),
            (*INT, *FLOAT, false),
            (*FLOAT, *INT, false),
            // runtime wrapping and transparency
            (*INT, runtime(*INT), true),
            (runtime(*INT), *INT, true),
            (runtime(*INT), *FLOAT, false),
            (*FLOAT, runtime(*INT), false),
            // sum membership
            (*INT, sum(vec![*INT, *STRING]), true),
            (*FLOAT, sum(vec![*INT, *STRING]), false),
            // sized arrays convert to the unsized array of the same element
            (array(*INT, 3), array(*INT, -1), true),
            (array(*INT, 3), array(*FLOAT, -1), false),
            (array(*INT, -1), array(*INT, 3), false),
            // intersects convert to each member
            (intersect(vec![*INT, *STRING]), *STRING, true),
            (intersect(vec![*INT, *STRING]), *BOOL, false),
            // named types do not implicitly unwrap
            (*STRING, base(8), false),
        ];
        for (i, (a, b, expected)) in cases.iter().enumerate() {
            assert_eq!(
                a.implicitly(*b),
                *expected,
                "implicit case #{}: {} => {}",
                i + 1,
                a,
                b
            );
        }
    }

    #[test]
    fn test_explicit_extends_implicit() {
        // number casts cross the int/float divide explicitly
        assert!(INT.explicitly(*FLOAT));
        assert!(FLOAT.explicitly(*INT));
        // sums project onto their members explicitly
        assert!(sum(vec![*INT, *STRING]).explicitly(*INT));
        // named types unwrap explicitly
        assert!(STRING.explicitly(base(8)));
        // still not everything goes
        assert!(!STRING.explicitly(*INT));
        assert!(!INT.explicitly(*STRING));
    }

    #[test]
    fn test_implicit_implies_explicit() {
        let samples = [
            *INT,
            *FLOAT,
            number(1, false),
            *STRING,
            *BOOL,
            *ANY,
            runtime(*INT),
            array(*INT, 3),
            array(*INT, -1),
            sum(vec![*INT, *STRING]),
            intersect(vec![*INT, *STRING]),
        ];
        for a in samples {
            for b in samples {
                if a.implicitly(b) {
                    assert!(a.explicitly(b), "{a} implicitly {b} but not explicitly");
                }
            }
        }
    }

    #[test]
    fn test_join_properties() {
        let samples = [
            *INT,
            *FLOAT,
            number(2, false),
            *STRING,
            *BOOL,
            runtime(*INT),
            array(*INT, 3),
        ];
        for a in samples {
            // idempotence
            assert_eq!(join(a, a), Some(a), "join({a}, {a})");
            for b in samples {
                // commutativity up to mutual convertibility
                match (join(a, b), join(b, a)) {
                    (Some(x), Some(y)) => {
                        assert!(
                            x == y || (x.implicitly(y) && y.implicitly(x)),
                            "join({a}, {b}) = {x} vs join({b}, {a}) = {y}"
                        );
                    }
                    (None, None) => {}
                    (x, y) => panic!("join({a}, {b}) = {x:?} vs join({b}, {a}) = {y:?}"),
                }
            }
        }
    }

    #[test]
    fn test_join_rules() {
        // undefined poisons
        assert_eq!(join(*UNDEFINED, *INT), Some(*UNDEFINED));
        assert_eq!(join(*FLOAT, *UNDEFINED), Some(*UNDEFINED));
        // a runtime side absorbs a compatible concrete side
        assert_eq!(join(*INT, runtime(*INT)), Some(runtime(*INT)));
        assert_eq!(join(runtime(*INT), *INT), Some(runtime(*INT)));
        // joining an integer with a float lands on the float
        assert_eq!(join(*INT, *FLOAT), Some(*FLOAT));
        assert_eq!(join(*FLOAT, *INT), Some(*FLOAT));
        // incompatible types do not meet
        assert_eq!(join(*STRING, *INT), None);
        assert_eq!(join(*BOOL, *FLOAT), None);
    }
}
