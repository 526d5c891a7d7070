//! Session-local type descriptor cache
//!
//! Synthesis assigns every type it touches a small descriptor carrying a
//! dense id and a display name. The cache memoizes token lookups for the
//! duration of one synthesis session and pre-interns the handful of
//! well-known entries: the in-progress proxy class itself (so generated
//! members can reference their own type before the class is finalized),
//! the void marker, the universal object type, and the text-string type.
//! The resulting table is recorded on the finished class definition and
//! referenced by id from the artifact encoding.
//!
//! One session per thread; the cache is deliberately not shared.

use rustc_hash::FxHashMap;
use standin_sdk::TypeToken;

use crate::{ProxyError, ProxyResult};

/// Descriptor id of the in-progress proxy class
pub const SELF_ID: u16 = 0;
/// Descriptor id of the void marker
pub const VOID_ID: u16 = 1;
/// Descriptor id of the universal object type
pub const OBJECT_ID: u16 = 2;
/// Descriptor id of the text-string type
pub const STRING_ID: u16 = 3;

/// Internal descriptor for one type referenced during synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Dense id within the session's table
    pub id: u16,
    /// Display name used in diagnostics and artifacts
    pub name: String,
    /// Token the descriptor was resolved from
    pub token: TypeToken,
}

/// Memoizing token-to-descriptor cache for one synthesis session
#[derive(Debug)]
pub struct DescriptorCache {
    ids: FxHashMap<TypeToken, u16>,
    table: Vec<TypeDescriptor>,
}

impl DescriptorCache {
    /// Create a cache seeded with the well-known descriptors.
    ///
    /// `proxy_name` is the name of the class being synthesized; its
    /// synthetic token resolves to the self descriptor at [`SELF_ID`].
    pub fn new(proxy_name: &str) -> Self {
        let mut cache = Self {
            ids: FxHashMap::default(),
            table: Vec::with_capacity(4),
        };
        cache.seed(SELF_ID, TypeToken::synthetic(proxy_name), proxy_name.to_string());
        cache.seed(VOID_ID, TypeToken::void(), "void".to_string());
        cache.seed(OBJECT_ID, TypeToken::object(), "object".to_string());
        cache.seed(STRING_ID, TypeToken::string(), "String".to_string());
        cache
    }

    fn seed(&mut self, id: u16, token: TypeToken, name: String) {
        self.ids.insert(token.clone(), id);
        self.table.push(TypeDescriptor { id, name, token });
    }

    fn intern(&mut self, token: TypeToken, name: String) -> ProxyResult<u16> {
        let id = u16::try_from(self.table.len()).map_err(|_| {
            ProxyError::Synthesis(format!(
                "Descriptor table is full; cannot intern `{name}`"
            ))
        })?;
        self.ids.insert(token.clone(), id);
        self.table.push(TypeDescriptor { id, name, token });
        Ok(id)
    }

    /// Resolve a token to its descriptor, interning it on first sight.
    ///
    /// Descriptor ids are u16; interning past that space fails with a
    /// [`ProxyError::Synthesis`] error.
    pub fn resolve(&mut self, token: &TypeToken) -> ProxyResult<&TypeDescriptor> {
        let id = match self.ids.get(token) {
            Some(&id) => id,
            None => self.intern(token.clone(), token.name().to_string())?,
        };
        Ok(&self.table[id as usize])
    }

    /// Look up a token without interning it
    pub fn lookup(&self, token: &TypeToken) -> Option<&TypeDescriptor> {
        self.ids.get(token).map(|&id| &self.table[id as usize])
    }

    /// Number of interned descriptors
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check whether the table is empty (never true after seeding)
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Borrow the descriptor table
    pub fn table(&self) -> &[TypeDescriptor] {
        &self.table
    }

    /// Consume the cache, yielding the session's descriptor table
    pub fn into_table(self) -> Vec<TypeDescriptor> {
        self.table
    }
}
