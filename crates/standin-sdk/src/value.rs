//! Value: tagged dynamic value crossing the interception boundary
//!
//! Every argument and result that travels from a statically typed call site
//! into an interceptor (and back) is carried as a `Value`. The representation
//! is an explicitly tagged union: a discriminant plus payload, so the
//! marshaling layer can match exhaustively over kinds instead of decoding a
//! packed encoding.
//!
//! # Kinds
//!
//! | Kind   | Payload                        | Notes                          |
//! |--------|--------------------------------|--------------------------------|
//! | Absent | none                           | "no value"; void results       |
//! | Bool   | `bool`                         | primitive                      |
//! | Int    | `i64`                          | primitive, covers i8..u32/i64  |
//! | Float  | `f64`                          | primitive, covers f32/f64      |
//! | Str    | `Arc<str>`                     | shared text                    |
//! | Ref    | `Arc<dyn Any + Send + Sync>`   | opaque shared reference        |
//!
//! # Equality
//!
//! Primitives and strings compare by content; references compare by pointer
//! identity. This is what call-recording assertions in tests rely on.

use std::any::Any;
use std::sync::Arc;

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value
    Absent,
    /// Boolean
    Bool,
    /// Integer
    Int,
    /// Float
    Float,
    /// String
    Str,
    /// Opaque object reference
    Ref,
}

/// Primitive kind used to select boxing and unboxing conversions.
///
/// Conversions are always picked by the declared parameter's or return
/// type's own primitive kind, never by a generic default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
    /// Integral types
    Int,
    /// Floating-point types
    Float,
    /// Boolean
    Bool,
}

impl PrimKind {
    /// The zero value of this primitive kind (0, 0.0, false).
    pub fn zero(self) -> Value {
        match self {
            PrimKind::Int => Value::int(0),
            PrimKind::Float => Value::float(0.0),
            PrimKind::Bool => Value::bool(false),
        }
    }
}

/// Tagged dynamic value.
#[derive(Clone)]
pub enum Value {
    /// No value
    Absent,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    Str(Arc<str>),
    /// Opaque shared object reference
    Ref(Arc<dyn Any + Send + Sync>),
}

impl Value {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create the absent value
    #[inline]
    pub fn absent() -> Self {
        Value::Absent
    }

    /// Create a boolean value
    #[inline]
    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    /// Create an integer value
    #[inline]
    pub fn int(i: i64) -> Self {
        Value::Int(i)
    }

    /// Create a float value
    #[inline]
    pub fn float(f: f64) -> Self {
        Value::Float(f)
    }

    /// Create a string value
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Create an opaque reference value owning `obj`
    pub fn object<T: Any + Send + Sync>(obj: T) -> Self {
        Value::Ref(Arc::new(obj))
    }

    /// Create a reference value from an existing shared allocation
    #[inline]
    pub fn from_ref(obj: Arc<dyn Any + Send + Sync>) -> Self {
        Value::Ref(obj)
    }

    // ========================================================================
    // Kind queries
    // ========================================================================

    /// The value's kind discriminant
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Absent => ValueKind::Absent,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Ref(_) => ValueKind::Ref,
        }
    }

    /// Check if the value is absent
    #[inline]
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Check if the value is a boolean
    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Check if the value is an integer
    #[inline]
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Check if the value is a float
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Check if the value is a string
    #[inline]
    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    /// Check if the value is an object reference
    #[inline]
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    /// The primitive kind of this value, if it is a primitive
    pub fn prim_kind(&self) -> Option<PrimKind> {
        match self {
            Value::Bool(_) => Some(PrimKind::Bool),
            Value::Int(_) => Some(PrimKind::Int),
            Value::Float(_) => Some(PrimKind::Float),
            _ => None,
        }
    }

    // ========================================================================
    // Extractors
    // ========================================================================

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the referenced object, downcast to `T`
    pub fn as_object<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Ref(obj) => (**obj).downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Clone out the shared reference, if this is a reference value
    pub fn clone_ref(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        match self {
            Value::Ref(obj) => Some(obj.clone()),
            _ => None,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Ref(_) => "object",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Absent
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Absent, Value::Absent) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Absent => write!(f, "Value::Absent"),
            Value::Bool(b) => write!(f, "Value::Bool({})", b),
            Value::Int(i) => write!(f, "Value::Int({})", i),
            Value::Float(x) => write!(f, "Value::Float({})", x),
            Value::Str(s) => write!(f, "Value::Str({:?})", s),
            Value::Ref(obj) => write!(f, "Value::Ref({:p})", Arc::as_ptr(obj)),
        }
    }
}
