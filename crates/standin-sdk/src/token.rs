//! TypeToken: language-level type handles
//!
//! A `TypeToken` identifies a type on the marshaling wire: the parameter
//! type array of a call descriptor holds tokens, the descriptor cache keys
//! on them, and constructor resolution matches against them.
//!
//! Two flavors exist: tokens backed by a Rust `TypeId` (created with
//! [`TypeToken::of`]) and synthetic tokens identified by name alone (created
//! with [`TypeToken::synthetic`], used for generated classes that have no
//! Rust type). Equality and hashing use only the identity, never the display
//! name, so the well-known aliases below compare equal to their `of` forms.

use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::value::{PrimKind, Value};

/// Identity of a type token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TokenKind {
    /// A Rust type, identified by its `TypeId`
    Rust(TypeId),
    /// A synthetic type, identified by name (generated classes, interfaces)
    Named(Arc<str>),
}

/// Handle to a type as seen by the marshaling protocol.
#[derive(Debug, Clone)]
pub struct TypeToken {
    kind: TokenKind,
    name: Arc<str>,
}

impl TypeToken {
    /// Token for the Rust type `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            kind: TokenKind::Rust(TypeId::of::<T>()),
            name: short_type_name(std::any::type_name::<T>()).into(),
        }
    }

    /// Synthetic token identified by name alone
    pub fn synthetic(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            kind: TokenKind::Named(name.clone()),
            name,
        }
    }

    /// The "no value" marker token
    pub fn void() -> Self {
        Self {
            kind: TokenKind::Rust(TypeId::of::<()>()),
            name: "void".into(),
        }
    }

    /// The universal boxed-object token
    pub fn object() -> Self {
        Self {
            kind: TokenKind::Rust(TypeId::of::<Value>()),
            name: "object".into(),
        }
    }

    /// The text-string token
    pub fn string() -> Self {
        Self {
            kind: TokenKind::Rust(TypeId::of::<String>()),
            name: "String".into(),
        }
    }

    /// Display name of the token
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this is the void marker
    pub fn is_void(&self) -> bool {
        self.kind == TokenKind::Rust(TypeId::of::<()>())
    }

    /// Check if this is the universal object token
    pub fn is_object(&self) -> bool {
        self.kind == TokenKind::Rust(TypeId::of::<Value>())
    }

    /// Check if this is the string token
    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::Rust(TypeId::of::<String>())
    }

    /// Check if this is a synthetic (name-only) token
    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, TokenKind::Named(_))
    }

    /// Check if this token denotes the Rust type `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.kind == TokenKind::Rust(TypeId::of::<T>())
    }

    /// The Rust type id behind this token, if it denotes a Rust type
    pub fn rust_id(&self) -> Option<TypeId> {
        match &self.kind {
            TokenKind::Rust(id) => Some(*id),
            TokenKind::Named(_) => None,
        }
    }

    /// The primitive kind of the denoted type, if it is a primitive
    pub fn prim_kind(&self) -> Option<PrimKind> {
        let id = match &self.kind {
            TokenKind::Rust(id) => *id,
            TokenKind::Named(_) => return None,
        };
        if id == TypeId::of::<i8>()
            || id == TypeId::of::<i16>()
            || id == TypeId::of::<i32>()
            || id == TypeId::of::<i64>()
            || id == TypeId::of::<u8>()
            || id == TypeId::of::<u16>()
            || id == TypeId::of::<u32>()
        {
            Some(PrimKind::Int)
        } else if id == TypeId::of::<f32>() || id == TypeId::of::<f64>() {
            Some(PrimKind::Float)
        } else if id == TypeId::of::<bool>() {
            Some(PrimKind::Bool)
        } else {
            None
        }
    }

    /// Look up a token by canonical name.
    ///
    /// Resolves the names produced by `name()` for primitives, strings, the
    /// void marker, and the universal object token. Used when decoding
    /// persisted artifacts back into live tokens; names outside this table
    /// decode as synthetic tokens.
    pub fn canonical(name: &str) -> Option<TypeToken> {
        WELL_KNOWN
            .iter()
            .find(|(alias, _)| *alias == name)
            .map(|(_, token)| token.clone())
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

/// Canonical-name table for artifact decoding
static WELL_KNOWN: Lazy<Vec<(&'static str, TypeToken)>> = Lazy::new(|| {
    vec![
        ("void", TypeToken::void()),
        ("()", TypeToken::void()),
        ("object", TypeToken::object()),
        ("Value", TypeToken::object()),
        ("String", TypeToken::string()),
        ("i8", TypeToken::of::<i8>()),
        ("i16", TypeToken::of::<i16>()),
        ("i32", TypeToken::of::<i32>()),
        ("i64", TypeToken::of::<i64>()),
        ("u8", TypeToken::of::<u8>()),
        ("u16", TypeToken::of::<u16>()),
        ("u32", TypeToken::of::<u32>()),
        ("f32", TypeToken::of::<f32>()),
        ("f64", TypeToken::of::<f64>()),
        ("bool", TypeToken::of::<bool>()),
    ]
});

/// Trim a fully qualified type path down to its final segment, keeping any
/// generic arguments intact (`alloc::string::String` becomes `String`).
pub(crate) fn short_type_name(full: &str) -> &str {
    let mut depth = 0usize;
    let mut start = 0usize;
    let bytes = full.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && i + 1 < bytes.len() && bytes[i + 1] == b':' => {
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    &full[start..]
}
