//! Standin SDK - Value, schema, and interceptor contracts for standin proxies
//!
//! This crate provides the types shared between proxy authors and the
//! standin engine:
//! - **Value**: Boxed runtime value passed through intercepted calls (`Value`)
//! - **Tokens**: Type identities that survive marshaling (`TypeToken`)
//! - **Schemas**: Ahead-of-time method tables for proxyable types
//!   (`TargetSchema`, built by hand or with `proxy_schema!`)
//! - **Interception**: The `Interceptor` trait and the `MethodCall` context
//!   it receives
//!
//! # Example
//!
//! ```rust,ignore
//! use standin_sdk::{proxy_schema, Interceptor, InvokeResult, MethodCall, Value};
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     fn new() -> Self {
//!         Greeter
//!     }
//!
//!     fn greet(&self, name: String) -> String {
//!         format!("hello {name}")
//!     }
//! }
//!
//! proxy_schema! {
//!     Greeter: "demo.Greeter" {
//!         ctor new();
//!         [public] fn greet(name: String) -> String;
//!     }
//! }
//!
//! struct Shouting;
//!
//! impl Interceptor for Shouting {
//!     fn intercept(&self, call: &mut MethodCall<'_>) -> InvokeResult<Value> {
//!         let out = call.invoke_original()?;
//!         match out.as_str() {
//!             Some(s) => Ok(Value::string(s.to_uppercase())),
//!             None => Ok(out),
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod convert;
mod error;
mod interceptor;
mod macros;
mod schema;
mod token;
mod value;

// ============================================================================
// Public Surface
// ============================================================================

pub use convert::{FromValue, IntoValue};
pub use error::{InvokeError, InvokeResult};
pub use interceptor::{Interceptor, MethodCall, OriginalCall, Passthrough};
pub use schema::{
    BaseObject, ConstructFn, ConstructorSchema, DirectFn, Introspect, MethodSchema, Modifiers,
    TargetSchema,
};
pub use token::TypeToken;
pub use value::{PrimKind, Value, ValueKind};
