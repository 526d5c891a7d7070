//! Interceptor notification
//!
//! Every intercepted call funnels through [`notify_interceptor`], whether
//! it arrives from a generated method body (INVOKE_DISPATCH) or from the
//! dynamic interface path. The funnel assembles the [`MethodCall`] context:
//! method name, declared parameter types, boxed arguments, and a handle to
//! the original implementation when the schema carries one.

use standin_sdk::{InvokeError, InvokeResult, MethodCall, OriginalCall, TypeToken, Value};

use crate::instance::ProxyObject;

/// Hand one intercepted call to the instance's bound interceptor.
///
/// Fails with [`InvokeError::InterceptorUnbound`] when no interceptor has
/// been bound. The original-call handle is attached only when the schema
/// entry has a direct invoker and the instance carries a base object, so
/// interface proxies always present calls without one.
pub fn notify_interceptor(
    object: &mut ProxyObject,
    method: &str,
    param_types: &[TypeToken],
    args: &[Value],
) -> InvokeResult<Value> {
    let handle = object
        .interceptor()
        .ok_or(InvokeError::InterceptorUnbound)?;
    let class = object.class().clone();
    let proxy_id = object.proxy_id();

    let invoker = class.schema.find_method(method).and_then(|m| m.invoker);
    let original = match (invoker, object.base_mut()) {
        (Some(invoke), Some(receiver)) => Some(OriginalCall { receiver, invoke }),
        _ => None,
    };

    let mut call = MethodCall::new(
        method,
        &class.schema.name,
        proxy_id,
        param_types,
        args,
        original,
    );
    handle.intercept(&mut call)
}
