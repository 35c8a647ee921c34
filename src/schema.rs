//! Schema-Datenmodell fuer Namespace-Extensions.
//!
//! An extension is declared as a table of [`ElementDescriptor`]s. Compound
//! descriptors point at an [`ElementType`] which again holds descriptors, so one
//! table describes a whole element tree. A [`NamespaceSchema`] binds the
//! top-level descriptors to a host [`Target`] (channel or item).
//!
//! Declaration order is kept everywhere: it drives serialization order and the
//! order of required-field listings.
//!
//! # Beispiel
//!
//! ```
//! use feedns::namespace::Namespace;
//! use feedns::schema::{ElementDescriptor, ElementType, NamespaceSchema, Target};
//! use feedns::value::ValueType;
//!
//! const NS: Namespace = Namespace::new("ex", "urn:example");
//!
//! let partner = ElementType::builder("partner", NS)
//!     .with(ElementDescriptor::attribute("id", ValueType::String).required())?
//!     .build()?;
//! let access = ElementType::builder("access", NS)
//!     .with(ElementDescriptor::singular("partner", partner).required())?
//!     .build()?;
//! let schema = NamespaceSchema::builder("ex", Target::Channel, NS)
//!     .with(ElementDescriptor::singular("access", access.clone()))?
//!     .build()?;
//!
//! assert_eq!(schema.lookup("access")?.name(), "access");
//! assert_eq!(access.required_names(), vec!["partner"]);
//! assert!(access.field("partner_id").is_some());
//! # Ok::<(), feedns::Error>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::namespace::Namespace;
use crate::value::ValueType;
use crate::{Error, FastIndexMap, Result};

// ============================================================================
// Target
// ============================================================================

/// Host model kind an extension schema attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    Channel,
    Item,
}

impl Target {
    /// Element name of the host, also the first segment of assembler paths.
    pub fn name(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Item => "item",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// What a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Scalar stored as an attribute of the owning element.
    Attribute,
    /// Scalar stored as the text of a child element.
    Text,
    /// Zero or one compound child.
    Singular,
    /// Ordered collection of compound children.
    Repeated,
}

impl ElementKind {
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Attribute | Self::Text)
    }

    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::Attribute => "an attribute",
            Self::Text => "a text element",
            Self::Singular => "a singular element",
            Self::Repeated => "a repeated element",
        }
    }
}

/// Cardinality of singular descriptors. Repeated descriptors are always `Optional`
/// (absence means an empty collection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Optional,
    Required,
}

/// Type a descriptor's values have.
#[derive(Debug, Clone)]
pub enum AssociatedType {
    Scalar(ValueType),
    Element(Arc<ElementType>),
}

/// One field of an extension.
#[derive(Debug, Clone)]
pub struct ElementDescriptor {
    name: &'static str,
    namespace: Namespace,
    kind: ElementKind,
    cardinality: Cardinality,
    associated_type: AssociatedType,
}

impl ElementDescriptor {
    /// Unqualified attribute of the owning element.
    pub fn attribute(name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            namespace: Namespace::NONE,
            kind: ElementKind::Attribute,
            cardinality: Cardinality::Optional,
            associated_type: AssociatedType::Scalar(value_type),
        }
    }

    /// Child element `<prefix:name>value</prefix:name>`.
    pub fn text(name: &'static str, namespace: Namespace, value_type: ValueType) -> Self {
        Self {
            name,
            namespace,
            kind: ElementKind::Text,
            cardinality: Cardinality::Optional,
            associated_type: AssociatedType::Scalar(value_type),
        }
    }

    /// Zero or one child of `element_type`, in the element type's namespace.
    pub fn singular(name: &'static str, element_type: Arc<ElementType>) -> Self {
        Self {
            name,
            namespace: element_type.namespace,
            kind: ElementKind::Singular,
            cardinality: Cardinality::Optional,
            associated_type: AssociatedType::Element(element_type),
        }
    }

    /// Ordered children of `element_type`.
    pub fn repeated(name: &'static str, element_type: Arc<ElementType>) -> Self {
        Self {
            name,
            namespace: element_type.namespace,
            kind: ElementKind::Repeated,
            cardinality: Cardinality::Optional,
            associated_type: AssociatedType::Element(element_type),
        }
    }

    /// Marks the descriptor required. No effect on repeated descriptors.
    pub fn required(mut self) -> Self {
        if self.kind != ElementKind::Repeated {
            self.cardinality = Cardinality::Required;
        }
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn namespace_prefix(&self) -> &'static str {
        self.namespace.prefix
    }

    pub fn namespace_uri(&self) -> &'static str {
        self.namespace.uri
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    pub fn associated_type(&self) -> &AssociatedType {
        &self.associated_type
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match &self.associated_type {
            AssociatedType::Scalar(vt) => Some(*vt),
            AssociatedType::Element(_) => None,
        }
    }

    pub fn element_type(&self) -> Option<&Arc<ElementType>> {
        match &self.associated_type {
            AssociatedType::Element(ty) => Some(ty),
            AssociatedType::Scalar(_) => None,
        }
    }

    pub(crate) fn kind_mismatch(&self, expected: &'static str) -> Error {
        Error::KindMismatch { name: self.name.to_string(), expected, found: self.kind.describe() }
    }
}

// ============================================================================
// Flat field layout (maker view)
// ============================================================================

/// Leaf of a flat field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLeaf {
    /// Scalar or repeated descriptor at this index of the last element type.
    Descriptor(usize),
    /// Character content of the last element type.
    Content,
}

/// Path of one flat maker field through singular compound children.
///
/// `partner_id` on `access` is `steps = [partner]`, `leaf = Descriptor(id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    steps: Vec<usize>,
    leaf: FieldLeaf,
    list: bool,
    required: bool,
}

impl FieldPath {
    /// Descriptor indices of the singular children walked through.
    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn leaf(&self) -> FieldLeaf {
        self.leaf
    }

    /// True for repeated descriptors (the field takes "append new").
    pub fn is_list(&self) -> bool {
        self.list
    }

    /// Required when every step and the leaf are required.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

const CONTENT_FIELD: &str = "content";

// ============================================================================
// ElementType
// ============================================================================

/// Shape of one compound element.
#[derive(Debug)]
pub struct ElementType {
    name: &'static str,
    namespace: Namespace,
    content: Option<ValueType>,
    descriptors: FastIndexMap<&'static str, ElementDescriptor>,
    fields: FastIndexMap<String, FieldPath>,
}

impl ElementType {
    pub fn builder(name: &'static str, namespace: Namespace) -> ElementTypeBuilder {
        ElementTypeBuilder {
            name,
            namespace,
            content: None,
            descriptors: FastIndexMap::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Namespace the element is required to be in.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// `prefix:name`.
    pub fn qualified_name(&self) -> String {
        self.namespace.qualify(self.name)
    }

    /// Type of the element's own character content, if any.
    pub fn content_type(&self) -> Option<ValueType> {
        self.content
    }

    /// Lookup by descriptor name.
    pub fn lookup(&self, name: &str) -> Result<&ElementDescriptor> {
        self.descriptors
            .get(name)
            .ok_or_else(|| Error::unknown_element(self.qualified_name(), name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.descriptors.get_index_of(name)
    }

    pub fn descriptor_at(&self, index: usize) -> Option<&ElementDescriptor> {
        self.descriptors.get_index(index).map(|(_, d)| d)
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> impl ExactSizeIterator<Item = &ElementDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Names of required descriptors in declaration order.
    pub fn required_names(&self) -> Vec<&'static str> {
        self.descriptors.values().filter(|d| d.is_required()).map(|d| d.name).collect()
    }

    /// Flat maker field by name.
    pub fn field(&self, name: &str) -> Option<&FieldPath> {
        self.fields.get(name)
    }

    /// Flat maker fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldPath)> {
        self.fields.iter().map(|(name, path)| (name.as_str(), path))
    }
}

/// Builder for [`ElementType`]. Registration is append-only.
#[derive(Debug)]
pub struct ElementTypeBuilder {
    name: &'static str,
    namespace: Namespace,
    content: Option<ValueType>,
    descriptors: FastIndexMap<&'static str, ElementDescriptor>,
}

impl ElementTypeBuilder {
    /// Adds a descriptor; fails with `DuplicateElement` if the name exists.
    pub fn register(&mut self, descriptor: ElementDescriptor) -> Result<&mut Self> {
        if descriptor.namespace.is_unprefixed() {
            return Err(Error::UnprefixedNamespace {
                owner: self.namespace.qualify(self.name).into(),
                uri: descriptor.namespace.uri.into(),
            });
        }
        if self.descriptors.contains_key(descriptor.name) {
            return Err(Error::duplicate_element(
                self.namespace.qualify(self.name),
                descriptor.name,
            ));
        }
        self.descriptors.insert(descriptor.name, descriptor);
        Ok(self)
    }

    /// Consuming variant of [`register`](Self::register) for table declarations.
    pub fn with(mut self, descriptor: ElementDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Declares typed character content for the element.
    pub fn content(mut self, value_type: ValueType) -> Self {
        self.content = Some(value_type);
        self
    }

    /// Freezes the type and derives its flat field layout.
    ///
    /// Fails with `DuplicateElement` when two paths flatten to the same field name.
    pub fn build(self) -> Result<Arc<ElementType>> {
        if self.namespace.is_unprefixed() {
            return Err(Error::UnprefixedNamespace {
                owner: self.name.into(),
                uri: self.namespace.uri.into(),
            });
        }
        let owner = self.namespace.qualify(self.name);
        let mut fields: FastIndexMap<String, FieldPath> = FastIndexMap::default();
        let mut insert = |name: String, path: FieldPath| -> Result<()> {
            if fields.contains_key(&name) {
                return Err(Error::duplicate_element(owner.clone(), name));
            }
            fields.insert(name, path);
            Ok(())
        };

        if self.content.is_some() {
            insert(
                CONTENT_FIELD.to_string(),
                FieldPath { steps: Vec::new(), leaf: FieldLeaf::Content, list: false, required: false },
            )?;
        }
        for (index, descriptor) in self.descriptors.values().enumerate() {
            match &descriptor.associated_type {
                AssociatedType::Scalar(_) => insert(
                    descriptor.name.to_string(),
                    FieldPath {
                        steps: Vec::new(),
                        leaf: FieldLeaf::Descriptor(index),
                        list: false,
                        required: descriptor.is_required(),
                    },
                )?,
                AssociatedType::Element(_) if descriptor.kind == ElementKind::Repeated => insert(
                    descriptor.name.to_string(),
                    FieldPath {
                        steps: Vec::new(),
                        leaf: FieldLeaf::Descriptor(index),
                        list: true,
                        required: false,
                    },
                )?,
                AssociatedType::Element(child) => {
                    for (sub_name, sub_path) in child.fields() {
                        let name = if sub_path.leaf == FieldLeaf::Content && sub_path.steps.is_empty() {
                            descriptor.name.to_string()
                        } else {
                            format!("{}_{sub_name}", descriptor.name)
                        };
                        let mut steps = Vec::with_capacity(sub_path.steps.len() + 1);
                        steps.push(index);
                        steps.extend_from_slice(&sub_path.steps);
                        insert(
                            name,
                            FieldPath {
                                steps,
                                leaf: sub_path.leaf,
                                list: sub_path.list,
                                required: descriptor.is_required() && sub_path.required,
                            },
                        )?;
                    }
                }
            }
        }

        Ok(Arc::new(ElementType {
            name: self.name,
            namespace: self.namespace,
            content: self.content,
            descriptors: self.descriptors,
            fields,
        }))
    }
}

// ============================================================================
// NamespaceSchema
// ============================================================================

/// Identity of a schema in a registry and in a host's extension map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub extension: &'static str,
    pub target: Target,
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.extension)
    }
}

/// Ordered top-level descriptors of one extension, bound to one target.
///
/// The descriptors live in a root [`ElementType`] named after the target; that
/// root is the type of the node a host attaches for this schema. It is never
/// serialized as an element itself.
#[derive(Debug)]
pub struct NamespaceSchema {
    extension: &'static str,
    version: &'static str,
    target: Target,
    namespace: Namespace,
    root: Arc<ElementType>,
}

impl NamespaceSchema {
    pub fn builder(
        extension: &'static str,
        target: Target,
        namespace: Namespace,
    ) -> NamespaceSchemaBuilder {
        NamespaceSchemaBuilder {
            extension,
            version: "1",
            target,
            root: ElementType::builder(target.name(), namespace),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn key(&self) -> SchemaKey {
        SchemaKey { extension: self.extension, target: self.target }
    }

    /// Root element type holding the top-level descriptors.
    pub fn root_type(&self) -> &Arc<ElementType> {
        &self.root
    }

    pub fn lookup(&self, name: &str) -> Result<&ElementDescriptor> {
        self.root.lookup(name)
    }

    /// Top-level descriptors in declaration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ElementDescriptor> {
        self.root.descriptors()
    }

    pub fn required_names(&self) -> Vec<&'static str> {
        self.root.required_names()
    }

    /// Assembler path of a top-level descriptor, e.g. `channel.spotify_access`.
    pub fn path_of(&self, name: &str) -> String {
        if self.namespace.prefix.is_empty() {
            format!("{}.{name}", self.target)
        } else {
            format!("{}.{}_{name}", self.target, self.namespace.prefix)
        }
    }
}

/// Builder for [`NamespaceSchema`].
#[derive(Debug)]
pub struct NamespaceSchemaBuilder {
    extension: &'static str,
    version: &'static str,
    target: Target,
    root: ElementTypeBuilder,
}

impl NamespaceSchemaBuilder {
    /// Adds a top-level descriptor.
    ///
    /// Attributes are rejected: the host element is not owned by the extension.
    pub fn register(&mut self, descriptor: ElementDescriptor) -> Result<&mut Self> {
        if descriptor.kind == ElementKind::Attribute {
            return Err(descriptor.kind_mismatch("a text or compound element"));
        }
        self.root.register(descriptor)?;
        Ok(self)
    }

    pub fn with(mut self, descriptor: ElementDescriptor) -> Result<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    pub fn version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    pub fn build(self) -> Result<NamespaceSchema> {
        let namespace = self.root.namespace;
        Ok(NamespaceSchema {
            extension: self.extension,
            version: self.version,
            target: self.target,
            namespace,
            root: self.root.build()?,
        })
    }
}
