//! Class registry
//!
//! [`ClassLoader`] holds the synthesized classes of one engine session,
//! keyed by class name. Loading a definition under an existing name
//! replaces the registry entry; instances created from the old class keep
//! their shared handle and are unaffected. With an artifact directory
//! configured, every loaded definition is also persisted to disk so a
//! later session can skip synthesis.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use standin_sdk::TargetSchema;

use crate::artifact;
use crate::emit::{CtorSlot, Program, ProxyClassDefinition};
use crate::synth;
use crate::{ProxyError, ProxyResult};

/// How a loaded class dispatches method calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Generated bodies from synthesis, run by the interpreter
    Synthesized,
    /// No generated bodies; every call marshals straight to the
    /// interceptor (interface proxies)
    Dynamic,
}

/// A loaded proxy class, shared by all of its instances.
pub struct LoadedClass {
    /// Class name
    pub name: String,
    /// Dispatch kind
    pub kind: ClassKind,
    /// Schema of the proxied target
    pub schema: Arc<TargetSchema>,
    /// Implemented interface names
    pub interfaces: Vec<String>,
    /// Instance field names, in slot order
    pub field_names: Vec<String>,
    /// Slot of the interceptor field
    pub interceptor_field: usize,
    /// Method name to program index
    pub vtable: FxHashMap<String, usize>,
    /// Generated method bodies
    pub programs: Vec<Program>,
    /// Constructor slots mirroring the schema constructors
    pub constructors: Vec<CtorSlot>,
}

impl LoadedClass {
    /// Build a dispatch-table class from a synthesized definition.
    pub fn from_definition(
        definition: &ProxyClassDefinition,
        schema: Arc<TargetSchema>,
    ) -> ProxyResult<Self> {
        let interceptor_field = definition
            .fields
            .iter()
            .position(|field| field.name == synth::INTERCEPTOR_FIELD)
            .ok_or_else(|| {
                ProxyError::Load(format!(
                    "Class `{}` has no interceptor field",
                    definition.name
                ))
            })?;

        let mut vtable = FxHashMap::default();
        let mut programs = Vec::with_capacity(definition.methods.len());
        for method in &definition.methods {
            vtable.insert(method.name.clone(), programs.len());
            programs.push(method.program.clone());
        }

        Ok(Self {
            name: definition.name.clone(),
            kind: ClassKind::Synthesized,
            schema,
            interfaces: definition.interfaces.clone(),
            field_names: definition.fields.iter().map(|f| f.name.clone()).collect(),
            interceptor_field,
            vtable,
            programs,
            constructors: definition.constructors.clone(),
        })
    }

    /// Build an interface-dispatch class with no generated bodies.
    pub fn dynamic(
        name: impl Into<String>,
        schema: Arc<TargetSchema>,
        interfaces: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Dynamic,
            schema,
            interfaces,
            field_names: vec![synth::INTERCEPTOR_FIELD.to_string()],
            interceptor_field: 0,
            vtable: FxHashMap::default(),
            programs: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Number of instance field slots
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }
}

/// Registry of loaded proxy classes.
pub struct ClassLoader {
    classes: RwLock<FxHashMap<String, Arc<LoadedClass>>>,
    artifact_dir: Option<PathBuf>,
}

impl ClassLoader {
    /// Create a loader without artifact persistence
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            artifact_dir: None,
        }
    }

    /// Create a loader persisting every loaded class under `dir`
    pub fn with_artifact_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            artifact_dir: Some(dir.into()),
        }
    }

    /// Configured artifact directory, if any
    pub fn artifact_dir(&self) -> Option<&Path> {
        self.artifact_dir.as_deref()
    }

    /// Load a synthesized definition, replacing any class with the same
    /// name. Persists the definition when an artifact directory is set.
    pub fn load(
        &self,
        definition: &ProxyClassDefinition,
        schema: Arc<TargetSchema>,
    ) -> ProxyResult<Arc<LoadedClass>> {
        if let Some(dir) = &self.artifact_dir {
            artifact::write_artifact(dir, definition)?;
        }
        self.register(definition, schema)
    }

    /// Load a previously persisted definition from disk.
    pub fn load_artifact(
        &self,
        path: &Path,
        schema: Arc<TargetSchema>,
    ) -> ProxyResult<Arc<LoadedClass>> {
        let definition = artifact::read_artifact(path)?;
        self.register(&definition, schema)
    }

    fn register(
        &self,
        definition: &ProxyClassDefinition,
        schema: Arc<TargetSchema>,
    ) -> ProxyResult<Arc<LoadedClass>> {
        let class = Arc::new(LoadedClass::from_definition(definition, schema)?);
        self.classes.write().insert(class.name.clone(), class.clone());
        Ok(class)
    }

    /// Look up a loaded class by name
    pub fn resolve(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.classes.read().get(name).cloned()
    }

    /// Whether a class with this name is loaded
    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    /// Number of loaded classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Delete all persisted artifacts, returning how many were removed.
    ///
    /// Loaded classes stay registered; only the on-disk cache is cleared.
    pub fn clear_artifacts(&self) -> ProxyResult<usize> {
        let dir = match &self.artifact_dir {
            Some(dir) => dir,
            None => return Ok(0),
        };
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(error) => {
                return Err(ProxyError::Artifact(format!(
                    "Cannot list `{}`: {error}",
                    dir.display()
                )))
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|error| {
                ProxyError::Artifact(format!("Cannot list `{}`: {error}", dir.display()))
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(artifact::ARTIFACT_EXTENSION)
            {
                std::fs::remove_file(&path).map_err(|error| {
                    ProxyError::Artifact(format!("Cannot remove `{}`: {error}", path.display()))
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for ClassLoader {
    fn default() -> Self {
        Self::new()
    }
}
