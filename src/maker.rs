//! Builder (Maker) Model.
//!
//! A [`Maker`] stages values for one compound element type. Fields are addressed
//! by their *flat* name: descriptor names joined with `_` through singular
//! children, so the `id` attribute of the `partner` child of `access` is
//! `partner_id` on the access maker. Values are coerced when set; nothing is
//! validated or written until the assembler commits the maker.
//!
//! # Beispiel
//!
//! ```
//! use feedns::maker::{Maker, MakerState};
//! use feedns::registry;
//! use feedns::schema::Target;
//!
//! let schema = registry::global().lookup("spotify", Target::Channel)?;
//! let mut root = Maker::for_schema(schema);
//! let access = root.nested("access")?;
//! access.set("partner_id", "partner-42")?;
//! access.set("sandbox_enabled", "1")?;
//!
//! assert_eq!(access.get("sandbox_enabled")?.and_then(|v| v.as_bool()), Some(true));
//! assert_eq!(root.state(), MakerState::PartiallySet);
//! # Ok::<(), feedns::Error>(())
//! ```

use std::sync::Arc;

use crate::element::{Element, Entry};
use crate::schema::{ElementDescriptor, ElementKind, ElementType, FieldLeaf, FieldPath, NamespaceSchema};
use crate::value::{ScalarValue, ValueType};
use crate::{Error, Result};

/// Lifecycle of a maker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakerState {
    /// Nothing set; commit is a no-op.
    Untouched,
    /// Values staged since the last commit.
    PartiallySet,
    /// Last commit succeeded and nothing changed since.
    Complete,
    /// Last commit failed and nothing changed since.
    Rejected,
}

#[derive(Debug, Clone)]
pub(crate) enum MakerSlot {
    Value(Option<ScalarValue>),
    Nested(Option<Box<Maker>>),
    List(Vec<Maker>),
}

impl MakerSlot {
    fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Attribute | ElementKind::Text => Self::Value(None),
            ElementKind::Singular => Self::Nested(None),
            ElementKind::Repeated => Self::List(Vec::new()),
        }
    }
}

/// Staging record for one compound element type.
#[derive(Debug, Clone)]
pub struct Maker {
    ty: Arc<ElementType>,
    slots: Vec<MakerSlot>,
    content: Option<ScalarValue>,
    /// Eigene Mutationen; verschachtelte Maker zaehlen ihre eigenen.
    revision: u64,
    /// Ergebnis und Gesamtrevision des letzten Commits.
    last_commit: Option<(MakerState, u64)>,
}

impl Maker {
    pub fn new(ty: Arc<ElementType>) -> Self {
        let slots = ty.descriptors().map(|d| MakerSlot::for_kind(d.kind())).collect();
        Self { ty, slots, content: None, revision: 0, last_commit: None }
    }

    /// Root maker of a schema; its fields are the schema's top-level descriptors.
    pub fn for_schema(schema: &NamespaceSchema) -> Self {
        Self::new(Arc::clone(schema.root_type()))
    }

    /// Maker staging every value of a parsed (or assembled) element.
    ///
    /// Committing it right away reproduces `element`, apart from optional
    /// children that carry no values.
    pub fn from_element(element: &Element) -> Self {
        let mut maker = Self::new(Arc::clone(element.element_type()));
        for (slot, (_, entry)) in maker.slots.iter_mut().zip(element.entries()) {
            *slot = match entry {
                Entry::Value(value) => MakerSlot::Value(value.cloned()),
                Entry::Child(child) => MakerSlot::Nested(child.map(|c| Box::new(Self::from_element(c)))),
                Entry::Children(children) => MakerSlot::List(children.iter().map(Self::from_element).collect()),
            };
        }
        maker.content = element.content().cloned();
        maker
    }

    pub fn element_type(&self) -> &Arc<ElementType> {
        &self.ty
    }

    /// True once any value beneath this maker was explicitly set.
    ///
    /// The value itself does not matter: `false` counts as set.
    pub fn is_touched(&self) -> bool {
        self.content.is_some()
            || self.slots.iter().any(|slot| match slot {
                MakerSlot::Value(v) => v.is_some(),
                MakerSlot::Nested(m) => m.as_ref().is_some_and(|m| m.is_touched()),
                MakerSlot::List(entries) => entries.iter().any(Maker::is_touched),
            })
    }

    pub fn state(&self) -> MakerState {
        if !self.is_touched() {
            return MakerState::Untouched;
        }
        match self.last_commit {
            Some((state, revision)) if revision == self.total_revision() => state,
            _ => MakerState::PartiallySet,
        }
    }

    /// Coerces `raw` to the field's declared type and stages it. Last write wins.
    pub fn set(&mut self, field: &str, raw: &str) -> Result<()> {
        let ty = Arc::clone(&self.ty);
        let path = self.scalar_field(&ty, field)?;
        let value = leaf_value_type(&ty, path, field)?.coerce(field, raw)?;
        self.store(path, Some(value));
        Ok(())
    }

    /// Stages an already typed value (strings are coerced).
    pub fn set_value(&mut self, field: &str, value: impl Into<ScalarValue>) -> Result<()> {
        let ty = Arc::clone(&self.ty);
        let path = self.scalar_field(&ty, field)?;
        let value = leaf_value_type(&ty, path, field)?.convert(field, value.into())?;
        self.store(path, Some(value));
        Ok(())
    }

    /// Unsets a field; returns the previous value.
    pub fn clear(&mut self, field: &str) -> Result<Option<ScalarValue>> {
        let ty = Arc::clone(&self.ty);
        let path = self.scalar_field(&ty, field)?;
        if self.walk(path.steps()).is_none() {
            return Ok(None);
        }
        Ok(self.store(path, None))
    }

    pub fn get(&self, field: &str) -> Result<Option<&ScalarValue>> {
        let path = self.scalar_field(&self.ty, field)?;
        let mut maker = self;
        for &step in path.steps() {
            match &maker.slots[step] {
                MakerSlot::Nested(Some(nested)) => maker = &**nested,
                _ => return Ok(None),
            }
        }
        Ok(match path.leaf() {
            FieldLeaf::Content => maker.content.as_ref(),
            FieldLeaf::Descriptor(index) => match &maker.slots[index] {
                MakerSlot::Value(v) => v.as_ref(),
                _ => None,
            },
        })
    }

    /// True when the flat field is set, or, for a compound descriptor name,
    /// when the nested maker (or list) is touched.
    pub fn is_set(&self, field: &str) -> bool {
        if let Some(index) = self.ty.position(field) {
            return match &self.slots[index] {
                MakerSlot::Value(v) => v.is_some(),
                MakerSlot::Nested(m) => m.as_ref().is_some_and(|m| m.is_touched()),
                MakerSlot::List(entries) => entries.iter().any(Maker::is_touched),
            };
        }
        matches!(self.get(field), Ok(Some(_)))
    }

    /// Nested maker of a singular compound descriptor, created on first access.
    pub fn nested(&mut self, name: &str) -> Result<&mut Maker> {
        let (index, descriptor) = self.descriptor(name)?;
        if descriptor.kind() != ElementKind::Singular {
            return Err(descriptor.kind_mismatch("a singular element"));
        }
        Ok(self.nested_at(index))
    }

    pub fn nested_ref(&self, name: &str) -> Option<&Maker> {
        match &self.slots[self.ty.position(name)?] {
            MakerSlot::Nested(m) => m.as_deref(),
            _ => None,
        }
    }

    /// Appends a new entry to a repeated descriptor and returns it.
    ///
    /// `field` may be a flat name reaching through singular children.
    pub fn append(&mut self, field: &str) -> Result<&mut Maker> {
        let ty = Arc::clone(&self.ty);
        let path = ty
            .field(field)
            .ok_or_else(|| Error::unknown_element(ty.qualified_name(), field))?;
        let FieldLeaf::Descriptor(index) = path.leaf() else {
            return Err(Error::KindMismatch {
                name: field.to_string(),
                expected: "a repeated element",
                found: "character content",
            });
        };
        if !path.is_list() {
            let found = leaf_descriptor(&ty, path)
                .map_or("a scalar", |d| d.kind().describe());
            return Err(Error::KindMismatch { name: field.to_string(), expected: "a repeated element", found });
        }
        let entry_ty = leaf_descriptor(&ty, path)
            .and_then(|d| d.element_type())
            .cloned()
            .ok_or_else(|| Error::unknown_element(ty.qualified_name(), field))?;

        let target = self.walk_create(path.steps());
        target.revision += 1;
        let MakerSlot::List(entries) = &mut target.slots[index] else {
            unreachable!("list field points at a repeated slot");
        };
        entries.push(Maker::new(entry_ty));
        let last = entries.len() - 1;
        Ok(&mut entries[last])
    }

    /// Entries of a repeated descriptor, in append order.
    pub fn entries(&self, field: &str) -> Result<&[Maker]> {
        let path = self
            .ty
            .field(field)
            .filter(|p| p.is_list())
            .ok_or_else(|| Error::unknown_element(self.ty.qualified_name(), field))?;
        let mut maker = self;
        for &step in path.steps() {
            match &maker.slots[step] {
                MakerSlot::Nested(Some(nested)) => maker = &**nested,
                _ => return Ok(&[]),
            }
        }
        match path.leaf() {
            FieldLeaf::Descriptor(index) => match &maker.slots[index] {
                MakerSlot::List(entries) => Ok(entries),
                _ => Ok(&[]),
            },
            FieldLeaf::Content => Ok(&[]),
        }
    }

    /// Discards everything staged.
    pub fn reset(&mut self) {
        *self = Self::new(Arc::clone(&self.ty));
    }

    // ------------------------------------------------------------------
    // crate internals (assembler)
    // ------------------------------------------------------------------

    pub(crate) fn slots(&self) -> &[MakerSlot] {
        &self.slots
    }

    pub(crate) fn content(&self) -> Option<&ScalarValue> {
        self.content.as_ref()
    }

    pub(crate) fn record_commit(&mut self, state: MakerState) {
        self.last_commit = Some((state, self.total_revision()));
    }

    fn total_revision(&self) -> u64 {
        self.revision
            + self
                .slots
                .iter()
                .map(|slot| match slot {
                    MakerSlot::Nested(Some(m)) => m.total_revision(),
                    MakerSlot::List(entries) => entries.iter().map(Maker::total_revision).sum(),
                    _ => 0,
                })
                .sum::<u64>()
    }

    fn descriptor(&self, name: &str) -> Result<(usize, &ElementDescriptor)> {
        let index = self
            .ty
            .position(name)
            .ok_or_else(|| Error::unknown_element(self.ty.qualified_name(), name))?;
        let descriptor = self.ty.lookup(name)?;
        Ok((index, descriptor))
    }

    /// Resolves a flat scalar (or content) field.
    fn scalar_field<'t>(&self, ty: &'t ElementType, field: &str) -> Result<&'t FieldPath> {
        let path = ty
            .field(field)
            .ok_or_else(|| Error::unknown_element(ty.qualified_name(), field))?;
        if path.is_list() {
            return Err(Error::KindMismatch {
                name: field.to_string(),
                expected: "an attribute or text element",
                found: ElementKind::Repeated.describe(),
            });
        }
        Ok(path)
    }

    fn nested_at(&mut self, index: usize) -> &mut Maker {
        let ty = self.ty.descriptor_at(index).and_then(|d| d.element_type()).cloned();
        match &mut self.slots[index] {
            MakerSlot::Nested(m) => m.get_or_insert_with(|| {
                let ty = ty.unwrap_or_else(|| unreachable!("singular descriptor without element type"));
                Box::new(Maker::new(ty))
            }),
            _ => unreachable!("nested_at on a non-singular slot"),
        }
    }

    fn walk(&mut self, steps: &[usize]) -> Option<&mut Maker> {
        let mut maker = self;
        for &step in steps {
            match &mut maker.slots[step] {
                MakerSlot::Nested(Some(nested)) => maker = &mut **nested,
                _ => return None,
            }
        }
        Some(maker)
    }

    fn walk_create(&mut self, steps: &[usize]) -> &mut Maker {
        let mut maker = self;
        for &step in steps {
            maker = maker.nested_at(step);
        }
        maker
    }

    fn store(&mut self, path: &FieldPath, value: Option<ScalarValue>) -> Option<ScalarValue> {
        let target = self.walk_create(path.steps());
        target.revision += 1;
        match path.leaf() {
            FieldLeaf::Content => std::mem::replace(&mut target.content, value),
            FieldLeaf::Descriptor(index) => match &mut target.slots[index] {
                MakerSlot::Value(v) => std::mem::replace(v, value),
                _ => None,
            },
        }
    }
}

/// Descriptor at the leaf of `path`, `None` for content leaves.
fn leaf_descriptor<'t>(ty: &'t ElementType, path: &FieldPath) -> Option<&'t ElementDescriptor> {
    let mut current = ty;
    for &step in path.steps() {
        current = current.descriptor_at(step)?.element_type()?;
    }
    match path.leaf() {
        FieldLeaf::Descriptor(index) => current.descriptor_at(index),
        FieldLeaf::Content => None,
    }
}

fn leaf_value_type(ty: &ElementType, path: &FieldPath, field: &str) -> Result<ValueType> {
    let mut current = ty;
    for &step in path.steps() {
        current = current
            .descriptor_at(step)
            .and_then(|d| d.element_type())
            .ok_or_else(|| Error::unknown_element(ty.qualified_name(), field))?;
    }
    let value_type = match path.leaf() {
        FieldLeaf::Content => current.content_type(),
        FieldLeaf::Descriptor(index) => current.descriptor_at(index).and_then(|d| d.value_type()),
    };
    value_type.ok_or_else(|| Error::KindMismatch {
        name: field.to_string(),
        expected: "an attribute or text element",
        found: "a compound element",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use crate::schema::ElementDescriptor as D;
    use crate::value::TriState;

    const NS: Namespace = Namespace::new("ex", "urn:example");

    fn access() -> Arc<ElementType> {
        let partner = ElementType::builder("partner", Namespace::NONE)
            .with(D::attribute("id", ValueType::String).required())
            .unwrap()
            .build()
            .unwrap();
        let sandbox = ElementType::builder("sandbox", Namespace::NONE)
            .with(D::attribute("enabled", ValueType::Boolean).required())
            .unwrap()
            .build()
            .unwrap();
        let label = ElementType::builder("label", NS).content(ValueType::YesOther).build().unwrap();
        let tag = ElementType::builder("tag", NS)
            .with(D::attribute("term", ValueType::String).required())
            .unwrap()
            .build()
            .unwrap();
        ElementType::builder("access", NS)
            .with(D::singular("partner", partner).required())
            .unwrap()
            .with(D::singular("sandbox", sandbox))
            .unwrap()
            .with(D::singular("label", label))
            .unwrap()
            .with(D::repeated("tag", tag))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn flat_fields_reach_through_children() {
        let mut m = Maker::new(access());
        assert_eq!(m.state(), MakerState::Untouched);
        m.set("partner_id", "42").unwrap();
        assert_eq!(m.get("partner_id").unwrap(), Some(&ScalarValue::from("42")));
        assert_eq!(m.nested_ref("partner").unwrap().get("id").unwrap(), Some(&ScalarValue::from("42")));
        assert!(m.is_set("partner"));
        assert!(!m.is_set("sandbox"));
        assert_eq!(m.state(), MakerState::PartiallySet);
    }

    #[test]
    fn false_counts_as_set() {
        let mut m = Maker::new(access());
        m.set_value("sandbox_enabled", false).unwrap();
        assert!(m.is_touched());
        assert!(m.is_set("sandbox_enabled"));
        assert_eq!(m.clear("sandbox_enabled").unwrap(), Some(ScalarValue::Boolean(false)));
        assert!(!m.is_touched());
    }

    #[test]
    fn last_write_wins_and_coercion_errors_keep_value() {
        let mut m = Maker::new(access());
        m.set("sandbox_enabled", "true").unwrap();
        m.set("sandbox_enabled", "0").unwrap();
        assert!(m.set("sandbox_enabled", "nope").is_err());
        assert_eq!(m.get("sandbox_enabled").unwrap(), Some(&ScalarValue::Boolean(false)));
    }

    #[test]
    fn failed_set_does_not_touch() {
        let mut m = Maker::new(access());
        assert!(m.set("sandbox_enabled", "nope").is_err());
        assert!(!m.is_touched());
        assert!(m.nested_ref("sandbox").is_none());
    }

    #[test]
    fn content_field_named_after_child() {
        let mut m = Maker::new(access());
        m.set("label", "clean").unwrap();
        assert_eq!(
            m.nested("label").unwrap().get("content").unwrap(),
            Some(&ScalarValue::TriState(TriState::Other("clean".into())))
        );
    }

    #[test]
    fn append_preserves_call_order() {
        let mut m = Maker::new(access());
        for term in ["b", "a", "c"] {
            m.append("tag").unwrap().set("term", term).unwrap();
        }
        let terms: Vec<_> = m
            .entries("tag")
            .unwrap()
            .iter()
            .filter_map(|e| e.get("term").ok().flatten().and_then(ScalarValue::as_str))
            .collect();
        assert_eq!(terms, vec!["b", "a", "c"]);
    }

    #[test]
    fn empty_entry_does_not_touch() {
        let mut m = Maker::new(access());
        m.append("tag").unwrap();
        assert!(!m.is_touched());
        assert!(!m.is_set("tag"));
        assert_eq!(m.entries("tag").unwrap().len(), 1);
    }

    #[test]
    fn from_element_stages_every_value() {
        let ty = access();
        let mut element = Element::new(Arc::clone(&ty));
        element.child_mut("partner").unwrap().set("id", "p").unwrap();
        element.child_mut("label").unwrap().set_content("no").unwrap();
        for term in ["x", "y"] {
            element.push_child("tag").unwrap().set("term", term).unwrap();
        }

        let m = Maker::from_element(&element);
        assert_eq!(m.state(), MakerState::PartiallySet);
        assert_eq!(m.get("partner_id").unwrap(), Some(&ScalarValue::from("p")));
        assert_eq!(m.get("label").unwrap(), Some(&ScalarValue::TriState(TriState::No)));
        assert!(!m.is_set("sandbox"));
        let terms: Vec<_> = m
            .entries("tag")
            .unwrap()
            .iter()
            .filter_map(|e| e.get("term").ok().flatten().and_then(ScalarValue::as_str))
            .collect();
        assert_eq!(terms, vec!["x", "y"]);
    }

    #[test]
    fn misuse_is_reported() {
        let mut m = Maker::new(access());
        assert!(matches!(m.set("nope", "x"), Err(Error::UnknownElement { .. })));
        assert!(matches!(m.set("tag", "x"), Err(Error::KindMismatch { .. })));
        assert!(matches!(m.append("partner_id"), Err(Error::KindMismatch { .. })));
        assert!(matches!(m.nested("tag"), Err(Error::KindMismatch { .. })));
        assert!(matches!(m.nested("nope"), Err(Error::UnknownElement { .. })));
    }

    #[test]
    fn nested_without_values_is_untouched() {
        let mut m = Maker::new(access());
        m.nested("sandbox").unwrap();
        assert!(!m.is_touched());
        assert!(!m.is_set("sandbox"));
        m.reset();
        assert!(m.nested_ref("sandbox").is_none());
    }

    #[test]
    fn state_follows_commits_and_later_edits() {
        let mut m = Maker::new(access());
        m.set("partner_id", "1").unwrap();
        m.record_commit(MakerState::Complete);
        assert_eq!(m.state(), MakerState::Complete);
        m.nested("sandbox").unwrap().set("enabled", "true").unwrap();
        assert_eq!(m.state(), MakerState::PartiallySet);
        m.record_commit(MakerState::Rejected);
        assert_eq!(m.state(), MakerState::Rejected);
    }
}
