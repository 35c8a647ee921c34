//! Parse-Side Model.
//!
//! An [`Element`] is one instance of a compound extension element. Its slots
//! mirror the descriptors of its [`ElementType`]: a scalar per attribute/text
//! descriptor, zero or one child per singular descriptor and an ordered list per
//! repeated descriptor. The same type is produced by the listener (read path)
//! and by the assembler (write path).

use std::fmt;
use std::sync::Arc;

use crate::namespace::Namespace;
use crate::schema::{ElementDescriptor, ElementKind, ElementType};
use crate::value::ScalarValue;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Scalar(Option<ScalarValue>),
    Child(Option<Box<Element>>),
    Children(Vec<Element>),
}

impl Slot {
    fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Attribute | ElementKind::Text => Self::Scalar(None),
            ElementKind::Singular => Self::Child(None),
            ElementKind::Repeated => Self::Children(Vec::new()),
        }
    }
}

/// Borrowed view of one slot, used by the serializer.
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Value(Option<&'a ScalarValue>),
    Child(Option<&'a Element>),
    Children(&'a [Element]),
}

/// One parsed (or assembled) compound element.
#[derive(Clone)]
pub struct Element {
    ty: Arc<ElementType>,
    slots: Vec<Slot>,
    content: Option<ScalarValue>,
}

impl Element {
    pub fn new(ty: Arc<ElementType>) -> Self {
        let slots = ty.descriptors().map(|d| Slot::for_kind(d.kind())).collect();
        Self { ty, slots, content: None }
    }

    pub fn element_type(&self) -> &Arc<ElementType> {
        &self.ty
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    /// Namespace the element must be in; checked by the parser before construction.
    pub fn required_namespace(&self) -> Namespace {
        self.ty.namespace()
    }

    /// True when nothing was set on the element or any descendant.
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.slots.iter().all(|slot| match slot {
                Slot::Scalar(v) => v.is_none(),
                Slot::Child(c) => c.is_none(),
                Slot::Children(c) => c.is_empty(),
            })
    }

    fn index_of(&self, name: &str) -> Result<(usize, &ElementDescriptor)> {
        descriptor_of(&self.ty, name)
    }

    // ------------------------------------------------------------------
    // Scalars (attribute / text descriptors)
    // ------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Result<Option<&ScalarValue>> {
        let (index, descriptor) = self.index_of(name)?;
        match &self.slots[index] {
            Slot::Scalar(v) => Ok(v.as_ref()),
            _ => Err(descriptor.kind_mismatch("an attribute or text element")),
        }
    }

    /// Lexical value of a string scalar, `None` when unset or unknown.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).ok().flatten().and_then(ScalarValue::as_str)
    }

    /// Coerces `raw` to the declared type and stores it.
    ///
    /// On `TypeCoercion` the previous value is kept.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<()> {
        let (index, descriptor) = self.index_of(name)?;
        let value_type = descriptor
            .value_type()
            .ok_or_else(|| descriptor.kind_mismatch("an attribute or text element"))?;
        let value = value_type.coerce(name, raw)?;
        self.slots[index] = Slot::Scalar(Some(value));
        Ok(())
    }

    pub fn set_value(&mut self, name: &str, value: impl Into<ScalarValue>) -> Result<()> {
        let (index, _) = self.index_of(name)?;
        self.set_value_at(index, value.into())
    }

    pub fn clear(&mut self, name: &str) -> Result<Option<ScalarValue>> {
        let ty = Arc::clone(&self.ty);
        let (index, descriptor) = descriptor_of(&ty, name)?;
        match &mut self.slots[index] {
            Slot::Scalar(v) => Ok(v.take()),
            _ => Err(descriptor.kind_mismatch("an attribute or text element")),
        }
    }

    pub(crate) fn clear_at(&mut self, index: usize) {
        if let Slot::Scalar(v) = &mut self.slots[index] {
            *v = None;
        }
    }

    pub(crate) fn set_value_at(&mut self, index: usize, value: ScalarValue) -> Result<()> {
        let descriptor = self
            .ty
            .descriptor_at(index)
            .ok_or_else(|| Error::unknown_element(self.ty.qualified_name(), index.to_string()))?;
        let value_type = descriptor
            .value_type()
            .ok_or_else(|| descriptor.kind_mismatch("an attribute or text element"))?;
        let value = value_type.convert(descriptor.name(), value)?;
        self.slots[index] = Slot::Scalar(Some(value));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Character content
    // ------------------------------------------------------------------

    pub fn content(&self) -> Option<&ScalarValue> {
        self.content.as_ref()
    }

    pub fn set_content(&mut self, raw: &str) -> Result<()> {
        let value_type = self.ty.content_type().ok_or_else(|| Error::KindMismatch {
            name: self.ty.name().to_string(),
            expected: "an element with character content",
            found: "an element without character content",
        })?;
        self.content = Some(value_type.coerce(self.ty.name(), raw)?);
        Ok(())
    }

    pub(crate) fn clear_content(&mut self) {
        self.content = None;
    }

    pub(crate) fn set_content_value(&mut self, value: ScalarValue) -> Result<()> {
        let value_type = self.ty.content_type().ok_or_else(|| Error::KindMismatch {
            name: self.ty.name().to_string(),
            expected: "an element with character content",
            found: "an element without character content",
        })?;
        self.content = Some(value_type.convert(self.ty.name(), value)?);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Singular children
    // ------------------------------------------------------------------

    pub fn child(&self, name: &str) -> Result<Option<&Element>> {
        let (index, descriptor) = self.index_of(name)?;
        match &self.slots[index] {
            Slot::Child(c) => Ok(c.as_deref()),
            _ => Err(descriptor.kind_mismatch("a singular element")),
        }
    }

    /// Existing child, or a fresh default instance created on first access.
    pub fn child_mut(&mut self, name: &str) -> Result<&mut Element> {
        let (index, descriptor) = self.index_of(name)?;
        if descriptor.kind() != ElementKind::Singular {
            return Err(descriptor.kind_mismatch("a singular element"));
        }
        Ok(self.child_mut_at(index))
    }

    /// Replaces the child; returns the previous one.
    pub fn set_child(&mut self, name: &str, child: Element) -> Result<Option<Element>> {
        let ty = Arc::clone(&self.ty);
        let (index, descriptor) = descriptor_of(&ty, name)?;
        check_child_type(descriptor, &child)?;
        match &mut self.slots[index] {
            Slot::Child(c) => Ok(c.replace(Box::new(child)).map(|b| *b)),
            _ => Err(descriptor.kind_mismatch("a singular element")),
        }
    }

    pub fn take_child(&mut self, name: &str) -> Result<Option<Element>> {
        let ty = Arc::clone(&self.ty);
        let (index, descriptor) = descriptor_of(&ty, name)?;
        match &mut self.slots[index] {
            Slot::Child(c) => Ok(c.take().map(|b| *b)),
            _ => Err(descriptor.kind_mismatch("a singular element")),
        }
    }

    /// Auto-vivifying access by descriptor index. The descriptor must be singular.
    pub(crate) fn child_mut_at(&mut self, index: usize) -> &mut Element {
        let ty = self.ty.descriptor_at(index).and_then(|d| d.element_type()).cloned();
        if !matches!(self.slots[index], Slot::Child(_)) {
            self.slots[index] = Slot::Child(None);
        }
        match &mut self.slots[index] {
            Slot::Child(c) => c.get_or_insert_with(|| {
                let ty = ty.unwrap_or_else(|| unreachable!("singular descriptor without element type"));
                Box::new(Element::new(ty))
            }),
            _ => unreachable!("slot was normalized to Child above"),
        }
    }

    pub(crate) fn set_child_at(&mut self, index: usize, child: Element) {
        self.slots[index] = Slot::Child(Some(Box::new(child)));
    }

    pub(crate) fn take_child_at(&mut self, index: usize) -> Option<Element> {
        match &mut self.slots[index] {
            Slot::Child(c) => c.take().map(|b| *b),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Repeated children
    // ------------------------------------------------------------------

    pub fn children(&self, name: &str) -> Result<&[Element]> {
        let (index, descriptor) = self.index_of(name)?;
        match &self.slots[index] {
            Slot::Children(c) => Ok(c),
            _ => Err(descriptor.kind_mismatch("a repeated element")),
        }
    }

    /// Creates a default instance, appends it and returns it for further mutation.
    pub fn push_child(&mut self, name: &str) -> Result<&mut Element> {
        let (index, descriptor) = self.index_of(name)?;
        let ty = match (descriptor.kind(), descriptor.element_type()) {
            (ElementKind::Repeated, Some(ty)) => Arc::clone(ty),
            _ => return Err(descriptor.kind_mismatch("a repeated element")),
        };
        let children = self.children_mut_at(index);
        children.push(Element::new(ty));
        let last = children.len() - 1;
        Ok(&mut children[last])
    }

    pub fn append_child(&mut self, name: &str, child: Element) -> Result<()> {
        let (index, descriptor) = self.index_of(name)?;
        if descriptor.kind() != ElementKind::Repeated {
            return Err(descriptor.kind_mismatch("a repeated element"));
        }
        check_child_type(descriptor, &child)?;
        self.children_mut_at(index).push(child);
        Ok(())
    }

    pub(crate) fn children_mut_at(&mut self, index: usize) -> &mut Vec<Element> {
        if !matches!(self.slots[index], Slot::Children(_)) {
            self.slots[index] = Slot::Children(Vec::new());
        }
        match &mut self.slots[index] {
            Slot::Children(c) => c,
            _ => unreachable!("slot was normalized to Children above"),
        }
    }

    /// Descriptors with their slots, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&ElementDescriptor, Entry<'_>)> {
        self.ty.descriptors().zip(self.slots.iter()).map(|(descriptor, slot)| {
            let entry = match slot {
                Slot::Scalar(v) => Entry::Value(v.as_ref()),
                Slot::Child(c) => Entry::Child(c.as_deref()),
                Slot::Children(c) => Entry::Children(c),
            };
            (descriptor, entry)
        })
    }
}

fn descriptor_of<'t>(ty: &'t ElementType, name: &str) -> Result<(usize, &'t ElementDescriptor)> {
    let index = ty
        .position(name)
        .ok_or_else(|| Error::unknown_element(ty.qualified_name(), name))?;
    // Index stammt aus position(), descriptor_at kann nicht fehlschlagen.
    let descriptor = ty
        .descriptor_at(index)
        .ok_or_else(|| Error::unknown_element(ty.qualified_name(), name))?;
    Ok((index, descriptor))
}

fn check_child_type(descriptor: &ElementDescriptor, child: &Element) -> Result<()> {
    match descriptor.element_type() {
        Some(ty) if Arc::ptr_eq(ty, &child.ty) => Ok(()),
        Some(_) => Err(Error::KindMismatch {
            name: descriptor.name().to_string(),
            expected: "an element of the declared type",
            found: "an element of another type",
        }),
        None => Err(descriptor.kind_mismatch("a compound element")),
    }
}

/// Gleichheit: selber Typ (Arc-Identitaet) und gleiche Werte.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.ty, &other.ty) && self.slots == other.slots && self.content == other.content
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        if let Some(content) = &self.content {
            s.field("content", content);
        }
        for (descriptor, entry) in self.entries() {
            match entry {
                Entry::Value(Some(v)) => {
                    s.field(descriptor.name(), v);
                }
                Entry::Child(Some(c)) => {
                    s.field(descriptor.name(), c);
                }
                Entry::Children(c) if !c.is_empty() => {
                    s.field(descriptor.name(), &c);
                }
                _ => {}
            }
        }
        s.finish()
    }
}
