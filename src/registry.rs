//! Schema Registry.
//!
//! Schemas are registered once during startup through a [`RegistryBuilder`] and
//! frozen into an immutable [`Registry`]. The frozen registry is `Send + Sync` and
//! can be read from any number of parse and build sessions without locking.
//!
//! [`global()`] holds the built-in extensions; it is built on first access and
//! never mutated afterwards.

use std::sync::{Arc, LazyLock};

use log::debug;

use crate::namespace::Namespace;
use crate::schema::{NamespaceSchema, SchemaKey, Target};
use crate::{Error, FastIndexMap, Result, spotify};

/// Append-only registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    schemas: FastIndexMap<SchemaKey, Arc<NamespaceSchema>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema. A second schema for the same extension and target is a
    /// `DuplicateElement` error.
    pub fn register(&mut self, schema: NamespaceSchema) -> Result<&mut Self> {
        let key = schema.key();
        if self.schemas.contains_key(&key) {
            return Err(Error::duplicate_element("registry", key.to_string()));
        }
        debug!(
            "registered schema {key} v{} ({} top-level elements, {})",
            schema.version(),
            schema.iter().len(),
            schema.namespace(),
        );
        self.schemas.insert(key, Arc::new(schema));
        Ok(self)
    }

    pub fn with(mut self, schema: NamespaceSchema) -> Result<Self> {
        self.register(schema)?;
        Ok(self)
    }

    pub fn freeze(self) -> Registry {
        Registry { schemas: self.schemas }
    }
}

/// Frozen, read-only set of schemas.
#[derive(Debug)]
pub struct Registry {
    schemas: FastIndexMap<SchemaKey, Arc<NamespaceSchema>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with the built-in extensions.
    pub fn builtin() -> Result<Self> {
        let mut builder = RegistryBuilder::new();
        spotify::register(&mut builder, spotify::Version::default())?;
        Ok(builder.freeze())
    }

    pub fn get(&self, extension: &str, target: Target) -> Option<&Arc<NamespaceSchema>> {
        self.schemas
            .values()
            .find(|s| s.extension() == extension && s.target() == target)
    }

    pub fn schema(&self, key: SchemaKey) -> Option<&Arc<NamespaceSchema>> {
        self.schemas.get(&key)
    }

    /// Like [`get`](Self::get), but a miss is `UnknownElement`.
    pub fn lookup(&self, extension: &str, target: Target) -> Result<&Arc<NamespaceSchema>> {
        self.get(extension, target)
            .ok_or_else(|| Error::unknown_element("registry", format!("{target}.{extension}")))
    }

    /// Schemas in registration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<NamespaceSchema>> {
        self.schemas.values()
    }

    pub fn for_target(&self, target: Target) -> impl Iterator<Item = &Arc<NamespaceSchema>> {
        self.schemas.values().filter(move |s| s.target() == target)
    }

    /// Distinct namespaces of all schemas, in registration order.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut out: Vec<Namespace> = Vec::new();
        for schema in self.schemas.values() {
            let ns = schema.namespace();
            if !ns.is_none() && !out.contains(&ns) {
                out.push(ns);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(|| {
    Registry::builtin()
        .unwrap_or_else(|e| panic!("built-in extension tables are inconsistent: {e}"))
});

/// Process-wide registry of the built-in extensions.
pub fn global() -> &'static Registry {
    &GLOBAL
}
