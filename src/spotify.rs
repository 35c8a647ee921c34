//! Spotify Open Access namespace.
//!
//! ```xml
//! <channel>
//!   <spotify:access>
//!     <partner id="partner-42"/>
//!     <sandbox enabled="true"/>
//!   </spotify:access>
//!   <item>
//!     <spotify:access>
//!       <entitlement name="premium"/>
//!     </spotify:access>
//!   </item>
//! </channel>
//! ```
//!
//! `access` lives in the spotify namespace, its children are unqualified.
//! The whole extension is a pair of descriptor tables; parsing, building and
//! validation are done by the generic machinery.

use std::sync::Arc;

use crate::element::Element;
use crate::host::ExtensionHost;
use crate::namespace::Namespace;
use crate::registry::RegistryBuilder;
use crate::schema::{ElementDescriptor, ElementType, NamespaceSchema, Target};
use crate::value::ValueType;
use crate::Result;

/// Extension name in the registry.
pub const EXTENSION: &str = "spotify";
pub const PREFIX: &str = "spotify";
pub const URI: &str = "http://purl.org/rss/1.0/modules/podcast/";
pub const NAMESPACE: Namespace = Namespace::new(PREFIX, URI);

/// Name of the only top-level element, on channel and item.
pub const ACCESS: &str = "access";

/// Versions of the descriptor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// Open Access 1.0: partner/sandbox on the channel, entitlement on items.
    #[default]
    OpenAccess1,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAccess1 => "1.0",
        }
    }
}

fn partner() -> Result<Arc<ElementType>> {
    ElementType::builder("partner", Namespace::NONE)
        .with(ElementDescriptor::attribute("id", ValueType::String).required())?
        .build()
}

fn sandbox() -> Result<Arc<ElementType>> {
    ElementType::builder("sandbox", Namespace::NONE)
        .with(ElementDescriptor::attribute("enabled", ValueType::Boolean).required())?
        .build()
}

fn entitlement() -> Result<Arc<ElementType>> {
    ElementType::builder("entitlement", Namespace::NONE)
        .with(ElementDescriptor::attribute("name", ValueType::String).required())?
        .build()
}

/// Channel-level table.
pub fn channel_schema(version: Version) -> Result<NamespaceSchema> {
    let access = match version {
        Version::OpenAccess1 => ElementType::builder(ACCESS, NAMESPACE)
            .with(ElementDescriptor::singular("partner", partner()?).required())?
            .with(ElementDescriptor::singular("sandbox", sandbox()?))?
            .build()?,
    };
    NamespaceSchema::builder(EXTENSION, Target::Channel, NAMESPACE)
        .version(version.as_str())
        .with(ElementDescriptor::singular(ACCESS, access))?
        .build()
}

/// Item-level table.
pub fn item_schema(version: Version) -> Result<NamespaceSchema> {
    let access = match version {
        Version::OpenAccess1 => ElementType::builder(ACCESS, NAMESPACE)
            .with(ElementDescriptor::singular("entitlement", entitlement()?).required())?
            .build()?,
    };
    NamespaceSchema::builder(EXTENSION, Target::Item, NAMESPACE)
        .version(version.as_str())
        .with(ElementDescriptor::singular(ACCESS, access))?
        .build()
}

/// Registers the channel and item tables.
pub fn register(builder: &mut RegistryBuilder, version: Version) -> Result<()> {
    builder.register(channel_schema(version)?)?;
    builder.register(item_schema(version)?)?;
    Ok(())
}

// ============================================================================
// Typed accessors
// ============================================================================

/// `<spotify:access>` of a host, if present.
pub fn access<H: ExtensionHost + ?Sized>(host: &H) -> Option<&Element> {
    host.extension(EXTENSION)?.child(ACCESS).ok().flatten()
}

/// `<spotify:access>` of a channel.
pub fn channel_access<H: ExtensionHost + ?Sized>(channel: &H) -> Option<&Element> {
    (channel.target() == Target::Channel).then(|| access(channel)).flatten()
}

/// `<spotify:access>` of an item.
pub fn item_access<H: ExtensionHost + ?Sized>(item: &H) -> Option<&Element> {
    (item.target() == Target::Item).then(|| access(item)).flatten()
}

/// `partner/@id` of a channel-level access element.
pub fn partner_id(access: &Element) -> Option<&str> {
    access.child("partner").ok().flatten()?.get_str("id")
}

/// `sandbox/@enabled` of a channel-level access element.
pub fn sandbox_enabled(access: &Element) -> Option<bool> {
    access
        .child("sandbox")
        .ok()
        .flatten()?
        .get("enabled")
        .ok()
        .flatten()?
        .as_bool()
}

/// `entitlement/@name` of an item-level access element.
pub fn entitlement_name(access: &Element) -> Option<&str> {
    access.child("entitlement").ok().flatten()?.get_str("name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ElementKind;

    #[test]
    fn channel_table_shape() {
        let schema = channel_schema(Version::default()).unwrap();
        assert_eq!(schema.version(), "1.0");
        let access = schema.lookup(ACCESS).unwrap();
        assert_eq!(access.kind(), ElementKind::Singular);
        assert!(!access.is_required());
        assert_eq!(access.namespace_uri(), URI);
        assert_eq!(access.namespace_prefix(), PREFIX);

        let ty = access.element_type().unwrap();
        assert_eq!(ty.required_names(), vec!["partner"]);
        let partner = ty.lookup("partner").unwrap();
        assert!(partner.namespace().is_none());
        let fields: Vec<_> = ty.fields().map(|(n, p)| (n, p.is_required())).collect();
        assert_eq!(fields, vec![("partner_id", true), ("sandbox_enabled", false)]);
    }

    #[test]
    fn item_table_shape() {
        let schema = item_schema(Version::default()).unwrap();
        let ty = schema.lookup(ACCESS).unwrap().element_type().unwrap().clone();
        assert_eq!(ty.required_names(), vec!["entitlement"]);
        assert!(ty.field("entitlement_name").unwrap().is_required());
        assert_eq!(schema.path_of(ACCESS), "item.spotify_access");
    }

    #[test]
    fn accessors_on_parsed_access() {
        let schema = channel_schema(Version::default()).unwrap();
        let ty = schema.lookup(ACCESS).unwrap().element_type().unwrap().clone();
        let mut access = Element::new(ty);
        assert_eq!(partner_id(&access), None);
        assert_eq!(sandbox_enabled(&access), None);

        access.child_mut("partner").unwrap().set("id", "p-1").unwrap();
        access.child_mut("sandbox").unwrap().set("enabled", "false").unwrap();
        assert_eq!(partner_id(&access), Some("p-1"));
        assert_eq!(sandbox_enabled(&access), Some(false));
        assert_eq!(entitlement_name(&access), None);
    }
}
