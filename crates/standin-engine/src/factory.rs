//! Proxy construction
//!
//! [`ProxyFactory`] is the front door: it synthesizes (or reuses) the
//! proxy class for a target, builds the base instance through the schema
//! constructor matching the requested signature, and binds the
//! interceptor before handing the proxy out. Interface targets skip
//! synthesis entirely and dispatch dynamically.

use std::path::PathBuf;
use std::sync::Arc;

use standin_sdk::{Interceptor, Introspect, TargetSchema, TypeToken, Value};

use crate::instance::ProxyObject;
use crate::loader::{ClassLoader, LoadedClass};
use crate::synth::{SynthOptions, Synthesizer, MARKER_INTERFACE, PROXY_SUFFIX};
use crate::{ProxyError, ProxyResult};

/// Creates interceptable proxies over schema-described targets.
pub struct ProxyFactory {
    loader: ClassLoader,
    synthesizer: Synthesizer,
}

impl ProxyFactory {
    /// Create a factory with default synthesis options
    pub fn new() -> Self {
        Self {
            loader: ClassLoader::new(),
            synthesizer: Synthesizer::new(),
        }
    }

    /// Create a factory with explicit synthesis options
    pub fn with_options(options: SynthOptions) -> Self {
        Self {
            loader: ClassLoader::new(),
            synthesizer: Synthesizer::with_options(options),
        }
    }

    /// Create a factory persisting synthesized classes under `dir`
    pub fn with_artifact_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            loader: ClassLoader::with_artifact_dir(dir),
            synthesizer: Synthesizer::new(),
        }
    }

    /// The factory's class registry
    pub fn loader(&self) -> &ClassLoader {
        &self.loader
    }

    /// Proxy a target with its zero-argument constructor.
    pub fn new_proxy<T: Introspect>(
        &self,
        interceptor: Arc<dyn Interceptor>,
    ) -> ProxyResult<ProxyObject> {
        self.new_proxy_with::<T>(&[], &[], interceptor)
    }

    /// Proxy a target, constructing the base through the constructor
    /// matching `param_types` with `args`.
    pub fn new_proxy_with<T: Introspect>(
        &self,
        param_types: &[TypeToken],
        args: &[Value],
        interceptor: Arc<dyn Interceptor>,
    ) -> ProxyResult<ProxyObject> {
        self.new_proxy_for_schema(T::schema(), param_types, args, interceptor)
    }

    /// Proxy an explicit schema. Concrete targets are synthesized and
    /// registered (reusing an already loaded class on repeat calls);
    /// interface targets dispatch dynamically without generated bodies.
    pub fn new_proxy_for_schema(
        &self,
        schema: TargetSchema,
        param_types: &[TypeToken],
        args: &[Value],
        interceptor: Arc<dyn Interceptor>,
    ) -> ProxyResult<ProxyObject> {
        if schema.is_final {
            return Err(ProxyError::FinalTarget(schema.name.clone()));
        }
        if schema.is_private {
            return Err(ProxyError::PrivateTarget(schema.name.clone()));
        }

        let schema = Arc::new(schema);
        if schema.is_interface {
            self.interface_proxy(schema, args, interceptor)
        } else {
            self.concrete_proxy(schema, param_types, args, interceptor)
        }
    }

    fn concrete_proxy(
        &self,
        schema: Arc<TargetSchema>,
        param_types: &[TypeToken],
        args: &[Value],
        interceptor: Arc<dyn Interceptor>,
    ) -> ProxyResult<ProxyObject> {
        let proxy_name = format!("{}{}", schema.name, PROXY_SUFFIX);
        let class = match self.loader.resolve(&proxy_name) {
            Some(class) => class,
            None => {
                let definition = self.synthesizer.synthesize(&schema)?;
                self.loader.load(&definition, schema.clone())?
            }
        };

        let (_, ctor) = class.schema.find_constructor(param_types).ok_or_else(|| {
            ProxyError::NoConstructor {
                class: class.schema.name.clone(),
                signature: describe_signature(param_types),
            }
        })?;
        let base = (ctor.construct)(args).map_err(|error| {
            ProxyError::Instantiation(format!(
                "Constructor for `{}` failed: {error}",
                class.schema.name
            ))
        })?;

        let mut proxy = ProxyObject::new(class, Some(base));
        proxy.set_interceptor(interceptor).map_err(|error| {
            ProxyError::Instantiation(format!("Interceptor binding failed: {error}"))
        })?;
        Ok(proxy)
    }

    fn interface_proxy(
        &self,
        schema: Arc<TargetSchema>,
        args: &[Value],
        interceptor: Arc<dyn Interceptor>,
    ) -> ProxyResult<ProxyObject> {
        if !args.is_empty() {
            return Err(ProxyError::Instantiation(
                "Interface proxies take no constructor arguments".to_string(),
            ));
        }
        let name = format!("{}{}", schema.name, PROXY_SUFFIX);
        let interfaces = vec![schema.name.clone(), MARKER_INTERFACE.to_string()];
        let class = Arc::new(LoadedClass::dynamic(name, schema, interfaces));
        let mut proxy = ProxyObject::new(class, None);
        proxy.set_interceptor(interceptor)?;
        Ok(proxy)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_signature(param_types: &[TypeToken]) -> String {
    param_types
        .iter()
        .map(TypeToken::name)
        .collect::<Vec<_>>()
        .join(", ")
}
