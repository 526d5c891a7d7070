//! Interception contract
//!
//! Every intercepted method on a proxy funnels into a single
//! [`Interceptor::intercept`] call carrying a [`MethodCall`]: the method
//! name, the declared parameter types, the boxed arguments, and (for
//! synthesized proxies over concrete targets) a handle for invoking the
//! original implementation. The interceptor decides whether to short
//! circuit, delegate, or wrap the original call.

use std::any::Any;

use crate::error::{InvokeError, InvokeResult};
use crate::schema::DirectFn;
use crate::token::TypeToken;
use crate::value::Value;

/// Handle for invoking the original (pre-proxy) implementation of the
/// intercepted method.
pub struct OriginalCall<'a> {
    /// Base instance the original method runs against
    pub receiver: &'a mut dyn Any,
    /// Direct invoker for the original method body
    pub invoke: DirectFn,
}

/// One intercepted method invocation.
pub struct MethodCall<'a> {
    method: &'a str,
    target: &'a str,
    proxy_id: u64,
    param_types: &'a [TypeToken],
    args: &'a [Value],
    original: Option<OriginalCall<'a>>,
}

impl<'a> MethodCall<'a> {
    /// Assemble a call context. Engine-side plumbing; interceptors only
    /// ever receive one.
    pub fn new(
        method: &'a str,
        target: &'a str,
        proxy_id: u64,
        param_types: &'a [TypeToken],
        args: &'a [Value],
        original: Option<OriginalCall<'a>>,
    ) -> Self {
        Self {
            method,
            target,
            proxy_id,
            param_types,
            args,
            original,
        }
    }

    /// Name of the intercepted method
    pub fn method(&self) -> &str {
        self.method
    }

    /// Name of the proxied target type
    pub fn target(&self) -> &str {
        self.target
    }

    /// Identity of the proxy instance the call arrived on
    pub fn proxy_id(&self) -> u64 {
        self.proxy_id
    }

    /// Declared parameter types, in order
    pub fn param_types(&self) -> &[TypeToken] {
        self.param_types
    }

    /// Boxed arguments, in order
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// One argument by position
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Whether an original implementation is available
    pub fn has_original(&self) -> bool {
        self.original.is_some()
    }

    /// Invoke the original implementation with the intercepted arguments.
    pub fn invoke_original(&mut self) -> InvokeResult<Value> {
        match self.original.as_mut() {
            Some(original) => (original.invoke)(original.receiver, self.args),
            None => Err(InvokeError::NoOriginal(self.method.to_string())),
        }
    }

    /// Invoke the original implementation with substituted arguments.
    pub fn invoke_original_with(&mut self, args: &[Value]) -> InvokeResult<Value> {
        match self.original.as_mut() {
            Some(original) => (original.invoke)(original.receiver, args),
            None => Err(InvokeError::NoOriginal(self.method.to_string())),
        }
    }
}

/// Receives every intercepted method call on the proxies it is bound to.
pub trait Interceptor: Send + Sync {
    /// Handle one intercepted call and produce its result.
    fn intercept(&self, call: &mut MethodCall<'_>) -> InvokeResult<Value>;
}

/// Interceptor that forwards every call to the original implementation
/// unchanged.
pub struct Passthrough;

impl Interceptor for Passthrough {
    fn intercept(&self, call: &mut MethodCall<'_>) -> InvokeResult<Value> {
        call.invoke_original()
    }
}

impl<F> Interceptor for F
where
    F: for<'a, 'b> Fn(&'b mut MethodCall<'a>) -> InvokeResult<Value> + Send + Sync,
{
    fn intercept(&self, call: &mut MethodCall<'_>) -> InvokeResult<Value> {
        self(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double_first(recv: &mut dyn Any, args: &[Value]) -> InvokeResult<Value> {
        let counter = recv.downcast_mut::<u32>().ok_or_else(|| {
            InvokeError::TypeMismatch {
                expected: "u32".to_string(),
                got: "foreign receiver".to_string(),
            }
        })?;
        *counter += 1;
        let first = args
            .first()
            .and_then(Value::as_int)
            .ok_or(InvokeError::ArityMismatch {
                expected: 1,
                got: args.len(),
            })?;
        Ok(Value::int(first * 2))
    }

    fn make_call<'a>(
        receiver: &'a mut dyn Any,
        param_types: &'a [TypeToken],
        args: &'a [Value],
    ) -> MethodCall<'a> {
        MethodCall::new(
            "double",
            "demo.Doubler",
            7,
            param_types,
            args,
            Some(OriginalCall {
                receiver,
                invoke: double_first,
            }),
        )
    }

    #[test]
    fn test_call_accessors() {
        let mut receiver = 0u32;
        let params = vec![TypeToken::of::<i64>()];
        let args = vec![Value::int(21)];
        let call = make_call(&mut receiver, &params, &args);

        assert_eq!(call.method(), "double");
        assert_eq!(call.target(), "demo.Doubler");
        assert_eq!(call.proxy_id(), 7);
        assert_eq!(call.param_types().len(), 1);
        assert_eq!(call.arg(0), Some(&Value::int(21)));
        assert!(call.arg(1).is_none());
        assert!(call.has_original());
    }

    #[test]
    fn test_invoke_original() {
        let mut receiver = 0u32;
        let params = vec![TypeToken::of::<i64>()];
        let args = vec![Value::int(21)];
        let mut call = make_call(&mut receiver, &params, &args);

        assert_eq!(call.invoke_original().unwrap(), Value::int(42));
        assert_eq!(call.invoke_original().unwrap(), Value::int(42));
        assert_eq!(receiver, 2);
    }

    #[test]
    fn test_invoke_original_with_substituted_args() {
        let mut receiver = 0u32;
        let params = vec![TypeToken::of::<i64>()];
        let args = vec![Value::int(21)];
        let mut call = make_call(&mut receiver, &params, &args);

        let out = call.invoke_original_with(&[Value::int(5)]).unwrap();
        assert_eq!(out, Value::int(10));
    }

    #[test]
    fn test_missing_original() {
        let params: Vec<TypeToken> = Vec::new();
        let args: Vec<Value> = Vec::new();
        let mut call = MethodCall::new("ping", "demo.Api", 1, &params, &args, None);

        assert!(!call.has_original());
        match call.invoke_original() {
            Err(InvokeError::NoOriginal(name)) => assert_eq!(name, "ping"),
            other => panic!("expected NoOriginal, got {other:?}"),
        }
    }

    #[test]
    fn test_passthrough_interceptor() {
        let mut receiver = 0u32;
        let params = vec![TypeToken::of::<i64>()];
        let args = vec![Value::int(3)];
        let mut call = make_call(&mut receiver, &params, &args);

        let out = Passthrough.intercept(&mut call).unwrap();
        assert_eq!(out, Value::int(6));
        assert_eq!(receiver, 1);
    }

    #[test]
    fn test_struct_interceptor_short_circuits() {
        struct Fixed;
        impl Interceptor for Fixed {
            fn intercept(&self, _call: &mut MethodCall<'_>) -> InvokeResult<Value> {
                Ok(Value::int(-1))
            }
        }

        let mut receiver = 0u32;
        let params = vec![TypeToken::of::<i64>()];
        let args = vec![Value::int(3)];
        let mut call = make_call(&mut receiver, &params, &args);

        assert_eq!(Fixed.intercept(&mut call).unwrap(), Value::int(-1));
        // Original never ran
        assert_eq!(receiver, 0);
    }
}
