//! feedns – declarative namespace extensions for RSS 2.0 feeds
//!
//! An extension is described once as a [`NamespaceSchema`] per host target
//! (channel or item). From that single description the crate derives
//! everything else:
//!
//! - parse-side element types ([`element::Element`]),
//! - the listener table that routes parser events ([`listener`]),
//! - staging records for building feeds ([`maker::Maker`]),
//! - required-field validation and assembly ([`assemble`]).
//!
//! The built-in registry carries the Spotify podcast namespace.
//!
//! # Beispiel
//!
//! ```
//! use feedns::{ParseOptions, RssMaker, parse_rss, rss_to_xml, spotify};
//!
//! // Build
//! let mut maker = RssMaker::new();
//! let access = maker.channel().extension(spotify::EXTENSION)?.nested("access")?;
//! access.set("partner_id", "partner-1")?;
//! access.set("sandbox_enabled", "true")?;
//! let feed = maker.to_feed()?;
//!
//! // Parse
//! let xml = rss_to_xml(&feed)?;
//! let parsed = parse_rss(&xml, &ParseOptions::default())?;
//! let access = spotify::channel_access(&parsed.channel).unwrap();
//! assert_eq!(spotify::partner_id(access), Some("partner-1"));
//! assert_eq!(spotify::sandbox_enabled(access), Some(true));
//! # Ok::<(), feedns::Error>(())
//! ```

pub mod assemble;
pub mod document;
pub mod element;
pub mod error;
pub mod host;
pub mod listener;
pub mod maker;
pub mod namespace;
pub mod options;
pub mod qname;
pub mod registry;
pub mod schema;
pub mod spotify;
pub mod value;
pub mod xml;
pub mod xml_serializer;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller als SipHash fuer kurze Keys).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash, Einfuegereihenfolge bleibt erhalten.
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Schema
pub use namespace::Namespace;
pub use qname::QName;
pub use schema::{Cardinality, ElementDescriptor, ElementKind, ElementType, NamespaceSchema, SchemaKey, Target};
pub use value::{ScalarValue, TriState, ValueType};
pub use registry::{Registry, RegistryBuilder};

// Parse / Build
pub use element::Element;
pub use host::{ExtensionHost, Extensions};
pub use maker::{Maker, MakerState};
pub use assemble::Commit;
pub use options::ParseOptions;
pub use document::{Channel, Item, Rss, RssMaker, parse_rss, parse_rss_reader, setup_maker};
pub use xml_serializer::{element_to_xml, rss_to_xml};
