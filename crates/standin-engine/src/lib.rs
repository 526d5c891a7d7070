//! Standin Proxy Engine
//!
//! This crate synthesizes interceptable proxy classes at runtime:
//! - **Descriptors**: Session-local type descriptor cache (`descriptor` module)
//! - **Emission**: Method and class assemblers producing stack bytecode
//!   (`emit` module)
//! - **Synthesis**: Proxy class generation from a target schema (`synth`
//!   module)
//! - **Evaluation**: The interpreter running generated method bodies
//!   (`eval` module)
//! - **Loading**: The class registry plus the on-disk artifact format
//!   (`loader` and `artifact` modules)
//! - **Dispatch**: Proxy instances, interceptor notification, and the
//!   factory front door (`instance`, `dispatch`, `factory` modules)
//!
//! # Example
//!
//! ```rust,ignore
//! use standin_engine::{proxy_schema, Interceptor, ProxyFactory};
//! use std::sync::Arc;
//!
//! let factory = ProxyFactory::new();
//! let mut proxy = factory.new_proxy::<Calculator>(Arc::new(AddOne))?;
//!
//! // Interceptor sees the call; the $super twin reaches the original.
//! assert_eq!(proxy.invoke("add", &[Value::int(2), Value::int(3)])?, Value::int(6));
//! assert_eq!(proxy.invoke("add$super", &[Value::int(2), Value::int(3)])?, Value::int(5));
//! ```

#![warn(missing_docs)]

// ============================================================================
// Core Modules
// ============================================================================

/// Artifact module: On-disk encoding of synthesized classes
pub mod artifact;

/// Descriptor module: Session-local type descriptor cache
pub mod descriptor;

/// Dispatch module: Interceptor notification for intercepted calls
pub mod dispatch;

/// Emit module: Method and class assemblers
pub mod emit;

/// Eval module: Interpreter for generated method bodies
pub mod eval;

/// Factory module: The front door for creating proxies
pub mod factory;

/// Instance module: Live proxy objects
pub mod instance;

/// Loader module: Class registry for synthesized definitions
pub mod loader;

/// Marshal module: Boxing, unboxing, and checked casts
pub mod marshal;

/// Synth module: Proxy class synthesis from target schemas
pub mod synth;

// ============================================================================
// Errors
// ============================================================================

/// Errors produced while synthesizing, loading, or instantiating proxies
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    /// Target type is final and cannot be extended
    #[error("Target `{0}` is final and cannot be extended")]
    FinalTarget(String),

    /// Target type is private and cannot be proxied
    #[error("Target `{0}` is private and cannot be proxied")]
    PrivateTarget(String),

    /// Class synthesis failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Class loading failed
    #[error("Load error: {0}")]
    Load(String),

    /// Artifact encoding, decoding, or I/O failed
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// No constructor matches the requested signature
    #[error("No constructor on `{class}` matching ({signature})")]
    NoConstructor {
        /// Target class name
        class: String,
        /// Comma-separated parameter type names
        signature: String,
    },

    /// Base instance construction or interceptor binding failed
    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    /// An invocation failed while the engine was driving it
    #[error(transparent)]
    Invoke(#[from] standin_sdk::InvokeError),
}

/// Result type for engine operations
pub type ProxyResult<T> = Result<T, ProxyError>;

// ============================================================================
// Re-exports from the SDK
// ============================================================================

pub use standin_sdk::{
    // Value model
    PrimKind, Value, ValueKind,
    // Tokens
    TypeToken,
    // Conversion
    FromValue, IntoValue,
    // Invocation errors
    InvokeError, InvokeResult,
    // Schemas
    BaseObject, ConstructFn, ConstructorSchema, DirectFn, Introspect, MethodSchema, Modifiers,
    TargetSchema,
    // Interception
    Interceptor, MethodCall, OriginalCall, Passthrough,
};

// The schema declaration macro lands at the SDK crate root; surface it here
// so engine users need a single dependency.
pub use standin_sdk::proxy_schema;

// ============================================================================
// Re-exports from Engine Modules
// ============================================================================

pub use artifact::{read_artifact, write_artifact, ARTIFACT_EXTENSION};
pub use descriptor::{DescriptorCache, TypeDescriptor};
pub use emit::{
    ClassAssembler, ConstantValue, CtorSlot, EmittedMethod, FieldDef, Label, MethodAssembler,
    Program, ProxyClassDefinition,
};
pub use factory::ProxyFactory;
pub use instance::ProxyObject;
pub use loader::{ClassKind, ClassLoader, LoadedClass};
pub use synth::{SynthOptions, Synthesizer, MARKER, PROXY_SUFFIX, SUPER_SUFFIX};
