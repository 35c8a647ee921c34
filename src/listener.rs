//! Listener Binding.
//!
//! The [`ListenerTable`] maps `(namespace URI, local name)` of every top-level
//! descriptor to a [`Binding`] per target. It is derived from a frozen
//! [`Registry`] once and then only read.
//!
//! An [`ExtensionListener`] consumes the tokenizer events of one host element
//! (channel or item) in document order. Top-level elements are dispatched via
//! the table; everything nested is resolved against the descriptors of the
//! element being built. Finished elements are attached to the host's
//! [`Extensions`] on their end tag.

use std::sync::{Arc, LazyLock};

use log::{debug, trace, warn};

use crate::element::Element;
use crate::host::Extensions;
use crate::options::ParseOptions;
use crate::qname::{ExpandedName, ExpandedNameRef, QName};
use crate::registry::{self, Registry};
use crate::schema::{ElementDescriptor, ElementKind, NamespaceSchema, Target};
use crate::value::{ScalarValue, ValueType};
use crate::xml::Attribute;
use crate::{Error, FastHashMap, Result};

// ============================================================================
// Binding table
// ============================================================================

/// Top-level descriptor of one schema, as seen by the parser.
#[derive(Debug, Clone)]
pub struct Binding {
    schema: Arc<NamespaceSchema>,
    index: usize,
    descriptor: ElementDescriptor,
}

impl Binding {
    pub fn schema(&self) -> &Arc<NamespaceSchema> {
        &self.schema
    }

    /// Position of the descriptor in the schema's root type.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &ElementDescriptor {
        &self.descriptor
    }

    /// Fresh default instance for compound descriptors, `None` for text elements.
    pub fn construct(&self) -> Option<Element> {
        self.descriptor.element_type().map(|ty| Element::new(Arc::clone(ty)))
    }
}

#[derive(Debug, Default)]
struct Entry {
    channel: Option<Binding>,
    item: Option<Binding>,
}

impl Entry {
    fn get(&self, target: Target) -> Option<&Binding> {
        match target {
            Target::Channel => self.channel.as_ref(),
            Target::Item => self.item.as_ref(),
        }
    }

    fn slot(&mut self, target: Target) -> &mut Option<Binding> {
        match target {
            Target::Channel => &mut self.channel,
            Target::Item => &mut self.item,
        }
    }
}

/// Dispatch table `(uri, local name) -> binding per target`.
#[derive(Debug, Default)]
pub struct ListenerTable {
    entries: FastHashMap<ExpandedName, Entry>,
}

impl ListenerTable {
    /// One entry per top-level descriptor of every schema.
    ///
    /// Two schemas binding the same name for the same target is a
    /// `DuplicateElement` error.
    pub fn from_registry(registry: &Registry) -> Result<Self> {
        let mut entries: FastHashMap<ExpandedName, Entry> = FastHashMap::default();
        for schema in registry.iter() {
            for (index, descriptor) in schema.iter().enumerate() {
                let key = ExpandedName::new(descriptor.namespace_uri(), descriptor.name());
                let slot = entries.entry(key.clone()).or_default().slot(schema.target());
                if slot.is_some() {
                    return Err(Error::duplicate_element(
                        format!("{} listeners", schema.target()),
                        key.to_string(),
                    ));
                }
                *slot = Some(Binding {
                    schema: Arc::clone(schema),
                    index,
                    descriptor: descriptor.clone(),
                });
            }
        }
        debug!("listener table: {} bound names", entries.len());
        Ok(Self { entries })
    }

    pub fn lookup(&self, uri: &str, local_name: &str, target: Target) -> Option<&Binding> {
        self.entries.get(&ExpandedNameRef::new(uri, local_name))?.get(target)
    }

    /// True when the name is bound for any target.
    pub fn contains(&self, uri: &str, local_name: &str) -> bool {
        self.entries.contains_key(&ExpandedNameRef::new(uri, local_name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static LISTENERS: LazyLock<ListenerTable> = LazyLock::new(|| {
    ListenerTable::from_registry(registry::global())
        .unwrap_or_else(|e| panic!("built-in listener table is inconsistent: {e}"))
});

/// Listener table of the built-in registry.
pub fn listeners() -> &'static ListenerTable {
    &LISTENERS
}

// ============================================================================
// Event consumer
// ============================================================================

/// Where a finished frame goes.
#[derive(Debug, Clone)]
enum Attach {
    /// Top-level descriptor: slot `index` of the schema's root node on the host.
    Host { schema: Arc<NamespaceSchema>, index: usize, kind: ElementKind },
    /// Slot `index` of the enclosing frame's element.
    Parent { index: usize, kind: ElementKind },
}

impl Attach {
    fn kind(&self) -> ElementKind {
        match self {
            Self::Host { kind, .. } | Self::Parent { kind, .. } => *kind,
        }
    }
}

#[derive(Debug)]
enum Frame {
    /// `text` is `None` until a text event arrived (`<a/>` has none).
    Node { element: Element, text: Option<String>, attach: Attach },
    Text { name: &'static str, value_type: ValueType, text: String, attach: Attach },
    /// Ignored subtree.
    Skip,
}

/// Event consumer for the extension elements of one host.
#[derive(Debug)]
pub struct ExtensionListener<'t> {
    table: &'t ListenerTable,
    target: Target,
    options: ParseOptions,
    stack: Vec<Frame>,
}

impl<'t> ExtensionListener<'t> {
    pub fn new(table: &'t ListenerTable, target: Target, options: ParseOptions) -> Self {
        Self { table, target, options, stack: Vec::new() }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// True while inside an extension element; all events belong to the listener.
    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Handles a start tag.
    ///
    /// Returns `false` when the listener is idle and the element is not bound;
    /// the caller then handles (or skips) it itself.
    pub fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<bool> {
        let parent_type = match self.stack.last() {
            None => None,
            Some(Frame::Node { element, .. }) => Some(Arc::clone(element.element_type())),
            Some(Frame::Text { .. } | Frame::Skip) => {
                self.stack.push(Frame::Skip);
                return Ok(true);
            }
        };

        let frame = match parent_type {
            None => {
                let Some(binding) = self.table.lookup(&name.uri, &name.local_name, self.target)
                else {
                    return Ok(false);
                };
                trace!("{} element {name} bound to {}", self.target, binding.schema().key());
                let attach = Attach::Host {
                    schema: Arc::clone(binding.schema()),
                    index: binding.index(),
                    kind: binding.descriptor().kind(),
                };
                self.open(binding.descriptor(), attach, attributes)?
            }
            Some(ty) => match ty.position(&name.local_name).and_then(|i| Some((i, ty.descriptor_at(i)?))) {
                Some((index, descriptor)) if descriptor.kind() != ElementKind::Attribute => {
                    if descriptor.namespace_uri() != name.uri {
                        let err = Error::NamespaceMismatch {
                            name: name.local_name.clone(),
                            expected: descriptor.namespace_uri().into(),
                            found: name.uri.clone(),
                        };
                        debug!("ignoring element in {}: {err}", ty.qualified_name());
                        Frame::Skip
                    } else {
                        let attach = Attach::Parent { index, kind: descriptor.kind() };
                        self.open(descriptor, attach, attributes)?
                    }
                }
                _ if self.options.ignore_unknown_element() => {
                    debug!("skipping unknown element {name} in {}", ty.qualified_name());
                    Frame::Skip
                }
                _ => {
                    return Err(Error::unknown_element(ty.qualified_name(), name.local_name.clone()));
                }
            },
        };
        self.stack.push(frame);
        Ok(true)
    }

    /// Character data; kept only for text elements and elements with content.
    pub fn text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(Frame::Node { text: buf, .. }) => buf.get_or_insert_with(String::new).push_str(text),
            Some(Frame::Text { text: buf, .. }) => buf.push_str(text),
            _ => {}
        }
    }

    /// Handles an end tag; a finished element is attached to its parent or to `host`.
    pub fn end_element(&mut self, host: &mut Extensions) -> Result<()> {
        let frame = self.stack.pop().ok_or_else(|| {
            Error::XmlParseError("end tag without open extension element".to_string())
        })?;
        match frame {
            Frame::Skip => Ok(()),
            Frame::Text { name, value_type, text, attach } => {
                match value_type.coerce(name, self.prepare(&text)) {
                    Ok(value) => self.attach_value(attach, value, host),
                    Err(err) => self.recover(err),
                }
            }
            Frame::Node { mut element, text, attach } => {
                if let Some(value_type) = element.element_type().content_type()
                    && let Some(text) = text
                {
                    let raw = self.prepare(&text);
                    // Leerer Inhalt zaehlt nur bei String-Inhalt.
                    if (!raw.is_empty() || value_type == ValueType::String)
                        && let Err(err) = element.set_content(raw)
                    {
                        self.recover(err)?;
                    }
                }
                self.attach_element(attach, element, host)
            }
        }
    }

    fn open(
        &self,
        descriptor: &ElementDescriptor,
        attach: Attach,
        attributes: &[Attribute],
    ) -> Result<Frame> {
        match descriptor.kind() {
            ElementKind::Text => Ok(Frame::Text {
                name: descriptor.name(),
                value_type: descriptor.value_type().unwrap_or_default(),
                text: String::new(),
                attach,
            }),
            ElementKind::Singular | ElementKind::Repeated => {
                let ty = descriptor
                    .element_type()
                    .ok_or_else(|| descriptor.kind_mismatch("a compound element"))?;
                let mut element = Element::new(Arc::clone(ty));
                for attribute in attributes {
                    self.apply_attribute(&mut element, attribute)?;
                }
                Ok(Frame::Node { element, text: None, attach })
            }
            ElementKind::Attribute => Err(descriptor.kind_mismatch("an element")),
        }
    }

    fn apply_attribute(&self, element: &mut Element, attribute: &Attribute) -> Result<()> {
        let ty = Arc::clone(element.element_type());
        match ty.lookup(&attribute.name.local_name) {
            Ok(d) if d.kind() == ElementKind::Attribute && d.namespace_uri() == attribute.name.uri => {
                match element.set(d.name(), &attribute.value) {
                    Ok(()) => Ok(()),
                    Err(err) => self.recover(err),
                }
            }
            _ => {
                trace!("ignoring attribute {} on {}", attribute.name, ty.qualified_name());
                Ok(())
            }
        }
    }

    fn attach_value(&mut self, attach: Attach, value: ScalarValue, host: &mut Extensions) -> Result<()> {
        match attach {
            Attach::Host { schema, index, .. } => host.get_or_insert(&schema).set_value_at(index, value),
            Attach::Parent { index, .. } => match self.stack.last_mut() {
                Some(Frame::Node { element, .. }) => element.set_value_at(index, value),
                _ => Err(Error::XmlParseError("text element without parent".to_string())),
            },
        }
    }

    fn attach_element(&mut self, attach: Attach, element: Element, host: &mut Extensions) -> Result<()> {
        let kind = attach.kind();
        let parent = match attach {
            Attach::Host { schema, index, .. } => (host.get_or_insert(&schema), index),
            Attach::Parent { index, .. } => match self.stack.last_mut() {
                Some(Frame::Node { element, .. }) => (element, index),
                _ => return Err(Error::XmlParseError("element without parent".to_string())),
            },
        };
        let (parent, index) = parent;
        if kind == ElementKind::Repeated {
            parent.children_mut_at(index).push(element);
        } else {
            // Mehrfaches Vorkommen: letztes gewinnt.
            parent.set_child_at(index, element);
        }
        Ok(())
    }

    /// Attribute values are never trimmed; typed values trim themselves.
    fn prepare<'a>(&self, text: &'a str) -> &'a str {
        if self.options.trim_text() { text.trim() } else { text }
    }

    /// Coercion failures abort validating parses, otherwise the value is dropped.
    fn recover(&self, err: Error) -> Result<()> {
        if self.options.validate() {
            Err(err)
        } else {
            warn!("dropping invalid value: {err}");
            Ok(())
        }
    }
}
