//! Ahead-of-time method tables describing proxyable targets
//!
//! A `TargetSchema` is the introspection surface of this system: instead of
//! enumerating methods through runtime reflection, every proxyable type
//! carries an explicit table of its methods, constructors, and modifiers,
//! produced at build time (by `proxy_schema!` or by hand with the builders
//! below). Each instance method entry carries a direct invoker thunk that
//! performs the non-virtual call into the base implementation; this is what
//! backs the generated invoke-original twins.

use std::any::Any;

use crate::error::InvokeResult;
use crate::token::TypeToken;
use crate::value::Value;

/// Boxed base instance held by a proxy.
pub type BaseObject = Box<dyn Any + Send>;

/// Direct (non-virtual) invoker for one base method.
///
/// Downcasts the receiver, unpacks the arguments, calls the base
/// implementation, and packs the result.
pub type DirectFn = fn(&mut dyn Any, &[Value]) -> InvokeResult<Value>;

/// Constructor thunk producing a fresh base instance.
pub type ConstructFn = fn(&[Value]) -> InvokeResult<BaseObject>;

/// Visibility and binding modifiers of a schema member.
///
/// An all-false set models a raw zero-modifier entry, as produced by some
/// introspection artifacts; such entries are never intercepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Publicly visible
    pub is_public: bool,
    /// Protected visibility
    pub is_protected: bool,
    /// Private visibility
    pub is_private: bool,
    /// Static binding (no receiver)
    pub is_static: bool,
    /// Final (not overridable)
    pub is_final: bool,
}

impl Modifiers {
    /// Plain public member
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::default()
        }
    }

    /// Empty modifier set
    pub fn none() -> Self {
        Self::default()
    }

    /// Mark as public
    pub fn as_public(mut self) -> Self {
        self.is_public = true;
        self
    }

    /// Mark as static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as final
    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Mark as private
    pub fn as_private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Mark as protected
    pub fn as_protected(mut self) -> Self {
        self.is_protected = true;
        self
    }

    /// Check whether no modifier is set
    pub fn is_empty(&self) -> bool {
        !(self.is_public || self.is_protected || self.is_private || self.is_static || self.is_final)
    }
}

/// Schema entry for one method on a target type.
#[derive(Debug, Clone)]
pub struct MethodSchema {
    /// Method name
    pub name: String,
    /// Declared parameter types, in order
    pub params: Vec<TypeToken>,
    /// Declared return type (void for no value)
    pub return_type: TypeToken,
    /// Member modifiers
    pub modifiers: Modifiers,
    /// Direct invoker into the base implementation (absent for statics and
    /// for interface methods, which have no base body)
    pub invoker: Option<DirectFn>,
}

impl MethodSchema {
    /// Create a public, void, parameterless method entry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: TypeToken::void(),
            modifiers: Modifiers::public(),
            invoker: None,
        }
    }

    /// Append a parameter type
    pub fn with_param(mut self, token: TypeToken) -> Self {
        self.params.push(token);
        self
    }

    /// Set the return type
    pub fn returns(mut self, token: TypeToken) -> Self {
        self.return_type = token;
        self
    }

    /// Replace the modifier set
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Attach the direct invoker
    pub fn with_invoker(mut self, invoker: DirectFn) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Declared parameter count
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Schema entry for one constructor on a target type.
#[derive(Debug, Clone)]
pub struct ConstructorSchema {
    /// Declared parameter types, in order
    pub params: Vec<TypeToken>,
    /// Thunk building the base instance
    pub construct: ConstructFn,
}

impl ConstructorSchema {
    /// Create a constructor entry
    pub fn new(params: Vec<TypeToken>, construct: ConstructFn) -> Self {
        Self { params, construct }
    }
}

/// Complete ahead-of-time description of a proxyable target type.
#[derive(Debug, Clone)]
pub struct TargetSchema {
    /// Fully qualified target name
    pub name: String,
    /// Type token for the target itself
    pub token: TypeToken,
    /// Whether the target is an interface (no base implementations)
    pub is_interface: bool,
    /// Whether the target is final (not extendable)
    pub is_final: bool,
    /// Whether the target is private (not instantiable from outside)
    pub is_private: bool,
    /// Declared method inventory
    pub methods: Vec<MethodSchema>,
    /// Declared constructors
    pub constructors: Vec<ConstructorSchema>,
}

impl TargetSchema {
    /// Create an empty schema for a concrete target
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            token: TypeToken::synthetic(name.clone()),
            name,
            is_interface: false,
            is_final: false,
            is_private: false,
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Replace the target's type token
    pub fn with_token(mut self, token: TypeToken) -> Self {
        self.token = token;
        self
    }

    /// Mark the target as an interface
    pub fn as_interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    /// Mark the target as final
    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Mark the target as private
    pub fn as_private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Append a method entry
    pub fn add_method(mut self, method: MethodSchema) -> Self {
        self.methods.push(method);
        self
    }

    /// Append a constructor entry
    pub fn add_constructor(mut self, constructor: ConstructorSchema) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Find a method entry by name
    pub fn find_method(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Find the constructor matching a parameter-type signature exactly
    pub fn find_constructor(&self, params: &[TypeToken]) -> Option<(usize, &ConstructorSchema)> {
        self.constructors
            .iter()
            .enumerate()
            .find(|(_, c)| c.params == params)
    }
}

/// Build-time introspection: a type that carries its own schema.
pub trait Introspect: Send + 'static {
    /// The ahead-of-time method table for this type
    fn schema() -> TargetSchema;
}
