//! Proxy class synthesis
//!
//! [`Synthesizer`] turns a target schema into a [`ProxyClassDefinition`]:
//! for every eligible method it emits an instrumented override that boxes
//! the arguments and notifies the interceptor, plus a `$super` twin that
//! invokes the original implementation directly. Infrastructure members
//! carry the `$` marker so they are never re-instrumented when a proxy
//! class is itself proxied.
//!
//! Eligibility: a method is instrumented when its name carries no marker
//! and it is neither static, final, nor private, and its modifier set is
//! not empty.

use rustc_hash::FxHashSet;

use standin_sdk::{MethodSchema, PrimKind, TargetSchema, TypeToken};

use crate::descriptor::DescriptorCache;
use crate::emit::{
    ArrayKind, ClassAssembler, CtorSlot, EmittedMethod, MethodAssembler, ProxyClassDefinition,
    SlotKind,
};
use crate::{ProxyError, ProxyResult};

/// Marker character reserved for proxy infrastructure member names
pub const MARKER: char = '$';

/// Suffix appended to the target name to form the proxy class name
pub const PROXY_SUFFIX: &str = "$Proxy";

/// Suffix appended to a method name to form its invoke-original twin
pub const SUPER_SUFFIX: &str = "$super";

/// Instance field holding the bound interceptor
pub const INTERCEPTOR_FIELD: &str = "$interceptor";

/// Generated method rebinding the interceptor field
pub const SETTER_NAME: &str = "set_interceptor$proxy";

/// Generated method reading back the interceptor field
pub const GETTER_NAME: &str = "get_interceptor$proxy";

/// Marker interface implemented by every synthesized class
pub const MARKER_INTERFACE: &str = "Proxied";

/// Synthesis options
#[derive(Debug, Clone, Copy)]
pub struct SynthOptions {
    /// Emit the interceptor getter alongside the setter
    pub emit_getter: bool,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self { emit_getter: true }
    }
}

/// Generates proxy class definitions from target schemas.
#[derive(Debug, Default)]
pub struct Synthesizer {
    options: SynthOptions,
}

impl Synthesizer {
    /// Create a synthesizer with default options
    pub fn new() -> Self {
        Self::with_options(SynthOptions::default())
    }

    /// Create a synthesizer with explicit options
    pub fn with_options(options: SynthOptions) -> Self {
        Self { options }
    }

    /// Whether a schema method receives an instrumented override
    pub fn eligible(method: &MethodSchema) -> bool {
        !method.name.contains(MARKER)
            && !method.modifiers.is_static
            && !method.modifiers.is_final
            && !method.modifiers.is_private
            && !method.modifiers.is_empty()
    }

    /// Synthesize the proxy class for a concrete target schema.
    pub fn synthesize(&self, schema: &TargetSchema) -> ProxyResult<ProxyClassDefinition> {
        if schema.is_final {
            return Err(ProxyError::FinalTarget(schema.name.clone()));
        }
        if schema.is_private {
            return Err(ProxyError::PrivateTarget(schema.name.clone()));
        }
        if schema.is_interface {
            return Err(ProxyError::Synthesis(format!(
                "`{}` is an interface; interface proxies dispatch dynamically",
                schema.name
            )));
        }

        let mut seen = FxHashSet::default();
        for method in &schema.methods {
            if !seen.insert(method.name.as_str()) {
                return Err(ProxyError::Synthesis(format!(
                    "Duplicate method name `{}` on `{}`",
                    method.name, schema.name
                )));
            }
        }

        let proxy_name = format!("{}{}", schema.name, PROXY_SUFFIX);
        let mut cache = DescriptorCache::new(&proxy_name);
        let mut class = ClassAssembler::new(&proxy_name, &schema.name);
        class.add_interface(MARKER_INTERFACE)?;
        let interceptor_field = class.declare_field(INTERCEPTOR_FIELD, TypeToken::object())?;

        for (slot, method) in schema.methods.iter().enumerate() {
            if !Self::eligible(method) {
                continue;
            }
            for param in &method.params {
                cache.resolve(param)?;
            }
            cache.resolve(&method.return_type)?;

            class.add_method(self.instrumented_override(method)?)?;
            class.add_method(self.super_twin(slot, method)?)?;
        }

        class.add_method(self.interceptor_setter(interceptor_field)?)?;
        if self.options.emit_getter {
            class.add_method(self.interceptor_getter(interceptor_field)?)?;
        }

        for (index, ctor) in schema.constructors.iter().enumerate() {
            for param in &ctor.params {
                cache.resolve(param)?;
            }
            class.add_constructor(CtorSlot {
                params: ctor.params.clone(),
                index,
            })?;
        }

        Ok(class.finish(cache.into_table()))
    }

    /// The instrumented override: box the arguments, notify the
    /// interceptor, coerce its result to the declared return type.
    fn instrumented_override(&self, method: &MethodSchema) -> ProxyResult<EmittedMethod> {
        let arity = method.params.len();
        let mut asm = MethodAssembler::new(method.name.as_str(), arity);
        let types_local = asm.declare_local(Some("types".to_string()), SlotKind::TypeArray)?;
        let values_local = asm.declare_local(Some("values".to_string()), SlotKind::ValueArray)?;

        asm.emit_push_int(arity as i64)?;
        asm.emit_new_array(ArrayKind::Types)?;
        asm.emit_store_local(types_local)?;
        asm.emit_push_int(arity as i64)?;
        asm.emit_new_array(ArrayKind::Values)?;
        asm.emit_store_local(values_local)?;

        for (index, param) in method.params.iter().enumerate() {
            asm.emit_load_local(types_local)?;
            asm.emit_push_int(index as i64)?;
            asm.emit_push_type(param.clone())?;
            asm.emit_array_store()?;

            asm.emit_load_local(values_local)?;
            asm.emit_push_int(index as i64)?;
            asm.emit_load_local(index)?;
            if let Some(kind) = param.prim_kind() {
                asm.emit_box(kind)?;
            }
            asm.emit_array_store()?;
        }

        asm.emit_push_str(method.name.as_str())?;
        asm.emit_load_local(types_local)?;
        asm.emit_load_local(values_local)?;
        asm.emit_load_this()?;
        asm.emit_invoke_dispatch()?;

        self.coerce_return(&mut asm, &method.return_type)?;

        Ok(EmittedMethod {
            name: method.name.clone(),
            params: method.params.clone(),
            return_type: method.return_type.clone(),
            program: asm.build()?,
        })
    }

    /// Coerce the interceptor's result to the declared return type. An
    /// absent result for a primitive return falls back to the zero value.
    fn coerce_return(
        &self,
        asm: &mut MethodAssembler,
        return_type: &TypeToken,
    ) -> ProxyResult<()> {
        if return_type.is_void() {
            asm.emit_pop()?;
            asm.emit_return_void()?;
        } else if let Some(kind) = return_type.prim_kind() {
            let absent = asm.define_label();
            asm.emit_dup()?;
            asm.emit_jump_if_absent(absent)?;
            asm.emit_unbox(kind)?;
            asm.emit_return()?;
            asm.mark_label(absent)?;
            asm.emit_pop()?;
            match kind {
                PrimKind::Int => asm.emit_push_int(0)?,
                PrimKind::Float => asm.emit_push_float(0.0)?,
                PrimKind::Bool => asm.emit_push_bool(false)?,
            }
            asm.emit_return()?;
        } else {
            asm.emit_cast(return_type.clone())?;
            asm.emit_return()?;
        }
        Ok(())
    }

    /// The `$super` twin: forward the parameters to the original
    /// implementation, bypassing the interceptor.
    fn super_twin(&self, slot: usize, method: &MethodSchema) -> ProxyResult<EmittedMethod> {
        let arity = method.params.len();
        let name = format!("{}{}", method.name, SUPER_SUFFIX);
        let mut asm = MethodAssembler::new(name.as_str(), arity);

        for index in 0..arity {
            asm.emit_load_local(index)?;
        }
        asm.emit_invoke_super(slot as u16, arity)?;
        if method.return_type.is_void() {
            asm.emit_pop()?;
            asm.emit_return_void()?;
        } else {
            asm.emit_return()?;
        }

        Ok(EmittedMethod {
            name,
            params: method.params.clone(),
            return_type: method.return_type.clone(),
            program: asm.build()?,
        })
    }

    fn interceptor_setter(&self, field: u16) -> ProxyResult<EmittedMethod> {
        let mut asm = MethodAssembler::new(SETTER_NAME, 1);
        asm.emit_load_this()?;
        asm.emit_load_local(0)?;
        asm.emit_store_field(field)?;
        asm.emit_return_void()?;

        Ok(EmittedMethod {
            name: SETTER_NAME.to_string(),
            params: vec![TypeToken::object()],
            return_type: TypeToken::void(),
            program: asm.build()?,
        })
    }

    fn interceptor_getter(&self, field: u16) -> ProxyResult<EmittedMethod> {
        let mut asm = MethodAssembler::new(GETTER_NAME, 0);
        asm.emit_load_this()?;
        asm.emit_load_field(field)?;
        asm.emit_return()?;

        Ok(EmittedMethod {
            name: GETTER_NAME.to_string(),
            params: Vec::new(),
            return_type: TypeToken::object(),
            program: asm.build()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::sync::Arc;

    use standin_sdk::{
        BaseObject, ConstructorSchema, InvokeError, InvokeResult, Modifiers, Passthrough, Value,
    };

    use crate::instance::ProxyObject;
    use crate::loader::{ClassLoader, LoadedClass};

    fn bump(recv: &mut dyn Any, args: &[Value]) -> InvokeResult<Value> {
        let counter = recv.downcast_mut::<i64>().ok_or_else(|| {
            InvokeError::TypeMismatch {
                expected: "i64".to_string(),
                got: "foreign receiver".to_string(),
            }
        })?;
        *counter += args.first().and_then(Value::as_int).unwrap_or(0);
        Ok(Value::int(*counter))
    }

    fn make_base(_args: &[Value]) -> InvokeResult<BaseObject> {
        Ok(Box::new(0i64))
    }

    fn counter_schema() -> TargetSchema {
        TargetSchema::new("demo.Counter")
            .add_constructor(ConstructorSchema::new(Vec::new(), make_base))
            .add_method(
                MethodSchema::new("bump")
                    .with_param(TypeToken::of::<i64>())
                    .returns(TypeToken::of::<i64>())
                    .with_invoker(bump),
            )
            .add_method(
                MethodSchema::new("seal").with_modifiers(Modifiers::public().as_final()),
            )
            .add_method(
                MethodSchema::new("hidden").with_modifiers(Modifiers::none().as_private()),
            )
            .add_method(
                MethodSchema::new("origin").with_modifiers(Modifiers::public().as_static()),
            )
            .add_method(MethodSchema::new("raw").with_modifiers(Modifiers::none()))
            .add_method(MethodSchema::new("note$x"))
    }

    fn method_names(definition: &ProxyClassDefinition) -> Vec<&str> {
        definition.methods.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_eligibility_filter() {
        let definition = Synthesizer::new().synthesize(&counter_schema()).unwrap();

        let names = method_names(&definition);
        assert_eq!(
            names,
            vec!["bump", "bump$super", SETTER_NAME, GETTER_NAME]
        );
    }

    #[test]
    fn test_eligible_predicate() {
        assert!(Synthesizer::eligible(&MethodSchema::new("add")));
        assert!(!Synthesizer::eligible(&MethodSchema::new("add$super")));
        assert!(!Synthesizer::eligible(
            &MethodSchema::new("seal").with_modifiers(Modifiers::public().as_final())
        ));
        assert!(!Synthesizer::eligible(
            &MethodSchema::new("hide").with_modifiers(Modifiers::none().as_private())
        ));
        assert!(!Synthesizer::eligible(
            &MethodSchema::new("origin").with_modifiers(Modifiers::public().as_static())
        ));
        assert!(!Synthesizer::eligible(
            &MethodSchema::new("raw").with_modifiers(Modifiers::none())
        ));
    }

    #[test]
    fn test_class_shape() {
        let definition = Synthesizer::new().synthesize(&counter_schema()).unwrap();

        assert_eq!(definition.name, "demo.Counter$Proxy");
        assert_eq!(definition.target_name, "demo.Counter");
        assert_eq!(definition.interfaces, vec![MARKER_INTERFACE.to_string()]);
        assert_eq!(definition.fields.len(), 1);
        assert_eq!(definition.fields[0].name, INTERCEPTOR_FIELD);
        assert_eq!(definition.constructors.len(), 1);
        assert_eq!(definition.constructors[0].index, 0);
        assert!(definition.constructors[0].params.is_empty());
    }

    #[test]
    fn test_descriptor_table_covers_signature_types() {
        let definition = Synthesizer::new().synthesize(&counter_schema()).unwrap();

        let names: Vec<&str> = definition.types.iter().map(|d| d.name.as_str()).collect();
        assert!(names.contains(&"demo.Counter$Proxy"));
        assert!(names.contains(&"void"));
        assert!(names.contains(&"i64"));
    }

    #[test]
    fn test_no_getter_option() {
        let synthesizer = Synthesizer::with_options(SynthOptions { emit_getter: false });
        let definition = synthesizer.synthesize(&counter_schema()).unwrap();

        let names = method_names(&definition);
        assert!(names.contains(&SETTER_NAME));
        assert!(!names.contains(&GETTER_NAME));
    }

    #[test]
    fn test_final_target_rejected() {
        let schema = TargetSchema::new("demo.Sealed").as_final();
        assert!(matches!(
            Synthesizer::new().synthesize(&schema),
            Err(ProxyError::FinalTarget(name)) if name == "demo.Sealed"
        ));
    }

    #[test]
    fn test_private_target_rejected() {
        let schema = TargetSchema::new("demo.Hidden").as_private();
        assert!(matches!(
            Synthesizer::new().synthesize(&schema),
            Err(ProxyError::PrivateTarget(name)) if name == "demo.Hidden"
        ));
    }

    #[test]
    fn test_interface_rejected() {
        let schema = TargetSchema::new("demo.Api").as_interface();
        assert!(matches!(
            Synthesizer::new().synthesize(&schema),
            Err(ProxyError::Synthesis(_))
        ));
    }

    #[test]
    fn test_duplicate_method_names_rejected() {
        let schema = TargetSchema::new("demo.Dup")
            .add_method(MethodSchema::new("run"))
            .add_method(MethodSchema::new("run").with_param(TypeToken::of::<i64>()));

        assert!(matches!(
            Synthesizer::new().synthesize(&schema),
            Err(ProxyError::Synthesis(message)) if message.contains("Duplicate method name")
        ));
    }

    #[test]
    fn test_synthesized_class_runs_end_to_end() {
        let schema = Arc::new(counter_schema());
        let definition = Synthesizer::new().synthesize(&schema).unwrap();
        let class = Arc::new(LoadedClass::from_definition(&definition, schema).unwrap());

        let mut proxy = ProxyObject::new(class, Some(Box::new(0i64)));
        proxy.set_interceptor(Arc::new(Passthrough)).unwrap();

        // Instrumented override delegates through the interceptor
        assert_eq!(proxy.invoke("bump", &[Value::int(5)]).unwrap(), Value::int(5));
        // The twin bypasses the interceptor and hits the original directly
        assert_eq!(
            proxy.invoke("bump$super", &[Value::int(2)]).unwrap(),
            Value::int(7)
        );
    }

    #[test]
    fn test_loader_accepts_synthesized_definition() {
        let schema = Arc::new(counter_schema());
        let definition = Synthesizer::new().synthesize(&schema).unwrap();
        let loader = ClassLoader::new();
        let class = loader.load(&definition, schema).unwrap();

        assert!(class.vtable.contains_key("bump"));
        assert!(class.vtable.contains_key("bump$super"));
        assert!(class.vtable.contains_key(SETTER_NAME));
        assert!(!class.vtable.contains_key("seal"));
    }
}
