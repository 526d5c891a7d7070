//! Live proxy instances
//!
//! A [`ProxyObject`] pairs a loaded class with an optional base instance
//! and the instance field table. Invocation routes by method name:
//! generated bodies from the class dispatch table run first, then the
//! schema inventory covers uninstrumented members. Interface proxies have
//! no generated bodies at all and marshal every call straight to the
//! bound interceptor.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use standin_sdk::{BaseObject, Interceptor, InvokeError, InvokeResult, Value};

use crate::dispatch;
use crate::eval;
use crate::loader::{ClassKind, LoadedClass};
use crate::marshal;
use crate::synth;

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Field cell carrying a bound interceptor through the value model.
pub(crate) struct InterceptorCell(pub(crate) Arc<dyn Interceptor>);

/// A live proxy instance.
pub struct ProxyObject {
    class: Arc<LoadedClass>,
    base: Option<BaseObject>,
    fields: Vec<Value>,
    id: u64,
}

impl ProxyObject {
    /// Attach a class to a base instance. Engine-side plumbing; callers
    /// reach proxies through the factory.
    pub(crate) fn new(class: Arc<LoadedClass>, base: Option<BaseObject>) -> Self {
        let fields = vec![Value::absent(); class.field_count()];
        Self {
            class,
            base,
            fields,
            id: NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// The loaded class backing this instance
    pub fn class(&self) -> &Arc<LoadedClass> {
        &self.class
    }

    /// Name of the synthesized class
    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Name of the proxied target type
    pub fn target_name(&self) -> &str {
        &self.class.schema.name
    }

    /// Identity of this instance, unique for the process lifetime
    pub fn proxy_id(&self) -> u64 {
        self.id
    }

    /// Whether an interceptor is currently bound
    pub fn is_bound(&self) -> bool {
        self.interceptor().is_some()
    }

    /// Invoke a method by name.
    ///
    /// Instrumented methods notify the interceptor; `$super` twins and
    /// uninstrumented members run the original implementation directly.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> InvokeResult<Value> {
        let class = self.class.clone();
        if let Some(&slot) = class.vtable.get(name) {
            return eval::run(self, &class.programs[slot], args);
        }
        match class.kind {
            ClassKind::Dynamic => self.invoke_dynamic(&class, name, args),
            ClassKind::Synthesized => self.invoke_schema_direct(&class, name, args),
        }
    }

    /// Bind (or rebind) the interceptor receiving this instance's calls.
    pub fn set_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) -> InvokeResult<()> {
        let handle = Value::object(InterceptorCell(interceptor));
        let class = self.class.clone();
        if let Some(&slot) = class.vtable.get(synth::SETTER_NAME) {
            eval::run(self, &class.programs[slot], &[handle])?;
            return Ok(());
        }
        match self.fields.get_mut(class.interceptor_field) {
            Some(field) => {
                *field = handle;
                Ok(())
            }
            None => Err(InvokeError::Runtime(
                "Instance has no interceptor field".to_string(),
            )),
        }
    }

    /// The currently bound interceptor, if any
    pub fn interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        let field = self.fields.get(self.class.interceptor_field)?;
        let referent = field.clone_ref()?;
        let cell = referent.downcast::<InterceptorCell>().ok()?;
        Some(cell.0.clone())
    }

    /// Borrow the base instance as a concrete type
    pub fn base_ref<T: Any>(&self) -> Option<&T> {
        self.base.as_deref().and_then(|base| base.downcast_ref::<T>())
    }

    pub(crate) fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    pub(crate) fn set_field(&mut self, index: usize, value: Value) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn base_mut(&mut self) -> Option<&mut dyn Any> {
        self.base.as_deref_mut().map(|base| base as &mut dyn Any)
    }

    /// Interface proxies: marshal the call and hand it to the interceptor.
    fn invoke_dynamic(
        &mut self,
        class: &LoadedClass,
        name: &str,
        args: &[Value],
    ) -> InvokeResult<Value> {
        let method = class
            .schema
            .find_method(name)
            .ok_or_else(|| InvokeError::UnknownMethod(name.to_string()))?;
        if method.modifiers.is_static {
            return Err(InvokeError::NotCallable(format!(
                "Method `{name}` is static"
            )));
        }
        let packed = marshal::pack_arguments(&method.params, args)?;
        let result = dispatch::notify_interceptor(self, name, &method.params, &packed)?;
        marshal::coerce_result(&method.return_type, result)
    }

    /// Uninstrumented members on a synthesized class run the original
    /// implementation without interception. Static entries resolve the
    /// same way; their invokers ignore the receiver.
    fn invoke_schema_direct(
        &mut self,
        class: &LoadedClass,
        name: &str,
        args: &[Value],
    ) -> InvokeResult<Value> {
        let method = class
            .schema
            .find_method(name)
            .ok_or_else(|| InvokeError::UnknownMethod(name.to_string()))?;
        let invoker = method.invoker.ok_or_else(|| {
            InvokeError::NotCallable(format!("Method `{name}` has no direct invoker"))
        })?;
        let receiver = self
            .base_mut()
            .ok_or_else(|| InvokeError::NoOriginal(name.to_string()))?;
        invoker(receiver, args)
    }
}
