//! Extension attachment on host documents (channel, item).
//!
//! A host keeps one root [`Element`] per extension schema. The root's type is the
//! schema's root type, so its slots are the schema's top-level descriptors:
//! `extensions.get("spotify")?.child("access")` is the channel's
//! `<spotify:access>`.

use crate::element::Element;
use crate::schema::{NamespaceSchema, Target};
use crate::FastIndexMap;

/// Extension nodes of one host, in attachment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    nodes: FastIndexMap<&'static str, Element>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, extension: &str) -> Option<&Element> {
        self.nodes.get(extension)
    }

    pub fn get_mut(&mut self, extension: &str) -> Option<&mut Element> {
        self.nodes.get_mut(extension)
    }

    /// Existing node of `schema`, or a new empty one.
    pub fn get_or_insert(&mut self, schema: &NamespaceSchema) -> &mut Element {
        self.nodes
            .entry(schema.extension())
            .or_insert_with(|| Element::new(schema.root_type().clone()))
    }

    pub fn insert(&mut self, extension: &'static str, node: Element) -> Option<Element> {
        self.nodes.insert(extension, node)
    }

    pub fn remove(&mut self, extension: &str) -> Option<Element> {
        self.nodes.shift_remove(extension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Element)> {
        self.nodes.iter().map(|(name, node)| (*name, node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A document node extensions attach to.
pub trait ExtensionHost {
    fn target(&self) -> Target;

    fn extensions(&self) -> &Extensions;

    fn extensions_mut(&mut self) -> &mut Extensions;

    /// Root node of one extension.
    fn extension(&self, extension: &str) -> Option<&Element> {
        self.extensions().get(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use crate::schema::ElementDescriptor;
    use crate::value::ValueType;

    const NS: Namespace = Namespace::new("ex", "urn:example");

    #[test]
    fn get_or_insert_reuses_node() {
        let schema = NamespaceSchema::builder("ex", Target::Item, NS)
            .with(ElementDescriptor::text("rating", NS, ValueType::String))
            .unwrap()
            .build()
            .unwrap();
        let mut ext = Extensions::new();
        assert!(ext.get("ex").is_none());
        ext.get_or_insert(&schema).set("rating", "clean").unwrap();
        ext.get_or_insert(&schema);
        assert_eq!(ext.len(), 1);
        assert_eq!(ext.get("ex").and_then(|n| n.get_str("rating")), Some("clean"));
        assert!(ext.remove("ex").is_some());
        assert!(ext.is_empty());
    }
}
