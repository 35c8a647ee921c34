//! Host documents: an RSS 2.0 skeleton carrying extension nodes.
//!
//! Only the structure needed to attach extensions is modelled: `rss`, `channel`
//! and `item`. Every other base element is skipped by the parser and never
//! produced by the maker.
//!
//! # Beispiel
//!
//! ```
//! use feedns::document::{RssMaker, parse_rss};
//! use feedns::options::ParseOptions;
//! use feedns::spotify;
//! use feedns::xml_serializer::rss_to_xml;
//!
//! let mut maker = RssMaker::new();
//! maker.channel().extension(spotify::EXTENSION)?.nested("access")?.set("partner_id", "42")?;
//! let rss = maker.to_feed()?;
//!
//! let xml = rss_to_xml(&rss)?;
//! let parsed = parse_rss(&xml, &ParseOptions::default())?;
//! let access = spotify::channel_access(&parsed.channel).unwrap();
//! assert_eq!(spotify::partner_id(access), Some("42"));
//! # Ok::<(), feedns::Error>(())
//! ```

use std::sync::Arc;

use log::debug;

use crate::assemble::{Commit, commit_schema};
use crate::host::{ExtensionHost, Extensions};
use crate::listener::{ExtensionListener, ListenerTable, listeners};
use crate::maker::Maker;
use crate::options::ParseOptions;
use crate::registry::{self, Registry};
use crate::schema::{NamespaceSchema, Target};
use crate::xml::{XmlEvent, emit_events};
use crate::{Error, FastIndexMap, Result};

/// RSS version written by the serializer.
pub const RSS_VERSION: &str = "2.0";

/// `<rss>` document.
#[derive(Debug, Clone, PartialEq)]
pub struct Rss {
    pub version: String,
    pub channel: Channel,
}

impl Default for Rss {
    fn default() -> Self {
        Self { version: RSS_VERSION.to_string(), channel: Channel::default() }
    }
}

/// `<channel>` with its items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub items: Vec<Item>,
    pub extensions: Extensions,
}

/// `<item>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub extensions: Extensions,
}

impl ExtensionHost for Channel {
    fn target(&self) -> Target {
        Target::Channel
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl ExtensionHost for Item {
    fn target(&self) -> Target {
        Target::Item
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses an RSS document with the built-in extensions.
pub fn parse_rss(xml: &str, options: &ParseOptions) -> Result<Rss> {
    parse_rss_with(xml, listeners(), options)
}

/// Parses an RSS document from a reader with the built-in extensions.
pub fn parse_rss_reader(reader: impl std::io::Read, options: &ParseOptions) -> Result<Rss> {
    let mut parser = DocumentParser::new(listeners(), *options);
    emit_events(reader, |event| parser.handle(event))?;
    parser.finish()
}

/// Parses with an explicit listener table (custom registries).
pub fn parse_rss_with(xml: &str, table: &ListenerTable, options: &ParseOptions) -> Result<Rss> {
    let mut parser = DocumentParser::new(table, *options);
    emit_events(xml.as_bytes(), |event| parser.handle(event))?;
    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Rss,
    Channel,
    Item,
    /// Base element we do not model, including all its content.
    Other,
}

struct DocumentParser<'t> {
    rss: Rss,
    stack: Vec<Level>,
    channel_listener: ExtensionListener<'t>,
    item_listener: ExtensionListener<'t>,
    current_item: Option<Item>,
    seen_root: bool,
}

impl<'t> DocumentParser<'t> {
    fn new(table: &'t ListenerTable, options: ParseOptions) -> Self {
        Self {
            rss: Rss::default(),
            stack: Vec::new(),
            channel_listener: ExtensionListener::new(table, Target::Channel, options),
            item_listener: ExtensionListener::new(table, Target::Item, options),
            current_item: None,
            seen_root: false,
        }
    }

    fn handle(&mut self, event: XmlEvent) -> Result<()> {
        match event {
            XmlEvent::Start { name, attributes } => {
                if self.item_listener.is_active() {
                    self.item_listener.start_element(&name, &attributes)?;
                    return Ok(());
                }
                if self.channel_listener.is_active() {
                    self.channel_listener.start_element(&name, &attributes)?;
                    return Ok(());
                }
                let level = match self.stack.last() {
                    None => {
                        if self.seen_root || name.local_name != "rss" || !name.uri.is_empty() {
                            return Err(Error::XmlParseError(format!(
                                "expected <rss> root element, found <{name}>"
                            )));
                        }
                        self.seen_root = true;
                        if let Some(version) = attributes
                            .iter()
                            .find(|a| a.name.uri.is_empty() && a.name.local_name == "version")
                        {
                            self.rss.version = version.value.clone();
                        }
                        Level::Rss
                    }
                    Some(Level::Rss) if name.uri.is_empty() && name.local_name == "channel" => {
                        Level::Channel
                    }
                    Some(Level::Channel) if name.uri.is_empty() && name.local_name == "item" => {
                        self.current_item = Some(Item::default());
                        Level::Item
                    }
                    Some(Level::Channel) => {
                        if self.channel_listener.start_element(&name, &attributes)? {
                            return Ok(());
                        }
                        Level::Other
                    }
                    Some(Level::Item) => {
                        if self.item_listener.start_element(&name, &attributes)? {
                            return Ok(());
                        }
                        Level::Other
                    }
                    Some(Level::Rss | Level::Other) => Level::Other,
                };
                self.stack.push(level);
            }
            XmlEvent::Text(text) => {
                if self.item_listener.is_active() {
                    self.item_listener.text(&text);
                } else if self.channel_listener.is_active() {
                    self.channel_listener.text(&text);
                }
            }
            XmlEvent::End => {
                if self.item_listener.is_active() {
                    let item = self.current_item.as_mut().ok_or_else(|| {
                        Error::XmlParseError("item extension outside of <item>".to_string())
                    })?;
                    return self.item_listener.end_element(&mut item.extensions);
                }
                if self.channel_listener.is_active() {
                    return self.channel_listener.end_element(&mut self.rss.channel.extensions);
                }
                if self.stack.pop() == Some(Level::Item)
                    && let Some(item) = self.current_item.take()
                {
                    self.rss.channel.items.push(item);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Rss> {
        if !self.seen_root {
            return Err(Error::XmlParseError("document has no <rss> root element".to_string()));
        }
        debug!(
            "parsed rss {}: {} channel extension(s), {} item(s)",
            self.rss.version,
            self.rss.channel.extensions.len(),
            self.rss.channel.items.len()
        );
        Ok(self.rss)
    }
}

// ============================================================================
// Building
// ============================================================================

/// Makers of one host, keyed by extension name.
#[derive(Debug, Clone)]
pub struct ExtensionMakers<'r> {
    registry: &'r Registry,
    target: Target,
    makers: FastIndexMap<&'static str, (Arc<NamespaceSchema>, Maker)>,
}

impl<'r> ExtensionMakers<'r> {
    fn new(registry: &'r Registry, target: Target) -> Self {
        Self { registry, target, makers: FastIndexMap::default() }
    }

    /// Root maker of an extension, created on first access.
    ///
    /// Unknown extensions (for this target) are `UnknownElement`.
    pub fn extension(&mut self, extension: &str) -> Result<&mut Maker> {
        let schema = self.registry.lookup(extension, self.target)?;
        let (_, maker) = self
            .makers
            .entry(schema.extension())
            .or_insert_with(|| (Arc::clone(schema), Maker::for_schema(schema)));
        Ok(maker)
    }

    pub fn get(&self, extension: &str) -> Option<&Maker> {
        self.makers.get(extension).map(|(_, maker)| maker)
    }

    /// Makers pre-filled from the extension nodes of a parsed host.
    ///
    /// A node whose type does not come from `registry` is a `KindMismatch`.
    fn from_host(registry: &'r Registry, target: Target, extensions: &Extensions) -> Result<Self> {
        let mut makers = Self::new(registry, target);
        for (extension, node) in extensions.iter() {
            let schema = registry.lookup(extension, target)?;
            if !Arc::ptr_eq(schema.root_type(), node.element_type()) {
                return Err(Error::KindMismatch {
                    name: extension.to_string(),
                    expected: "a node of the registered schema",
                    found: "a node of another schema",
                });
            }
            makers
                .makers
                .insert(schema.extension(), (Arc::clone(schema), Maker::from_element(node)));
        }
        Ok(makers)
    }

    /// Commits every extension onto `host`; stops at the first failure.
    fn commit(&mut self, host: &mut Extensions) -> Result<()> {
        for (schema, maker) in self.makers.values_mut() {
            if commit_schema(maker, schema, host)? == Commit::Absent {
                debug!("{} absent, nothing assembled", schema.key());
            }
        }
        Ok(())
    }
}

/// Builder for one `<item>`.
#[derive(Debug, Clone)]
pub struct ItemMaker<'r> {
    extensions: ExtensionMakers<'r>,
}

impl<'r> ItemMaker<'r> {
    pub fn extension(&mut self, extension: &str) -> Result<&mut Maker> {
        self.extensions.extension(extension)
    }

    pub fn extensions(&self) -> &ExtensionMakers<'r> {
        &self.extensions
    }
}

/// Builder for the `<channel>`.
#[derive(Debug, Clone)]
pub struct ChannelMaker<'r> {
    extensions: ExtensionMakers<'r>,
    items: Vec<ItemMaker<'r>>,
}

impl<'r> ChannelMaker<'r> {
    pub fn extension(&mut self, extension: &str) -> Result<&mut Maker> {
        self.extensions.extension(extension)
    }

    pub fn extensions(&self) -> &ExtensionMakers<'r> {
        &self.extensions
    }

    /// Appends an item maker and returns it.
    pub fn new_item(&mut self) -> &mut ItemMaker<'r> {
        let registry = self.extensions.registry;
        self.items.push(ItemMaker { extensions: ExtensionMakers::new(registry, Target::Item) });
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    pub fn items(&self) -> &[ItemMaker<'r>] {
        &self.items
    }
}

/// Maker holding every extension value of `rss`, parsed with the built-in
/// registry. Changing values and calling `to_feed` yields the edited feed.
pub fn setup_maker(rss: &Rss) -> Result<RssMaker<'static>> {
    RssMaker::from_rss(rss, registry::global())
}

/// Builder for a whole feed.
#[derive(Debug, Clone)]
pub struct RssMaker<'r> {
    channel: ChannelMaker<'r>,
}

impl RssMaker<'static> {
    /// Maker using the built-in registry.
    pub fn new() -> Self {
        Self::with_registry(registry::global())
    }
}

impl Default for RssMaker<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> RssMaker<'r> {
    pub fn with_registry(registry: &'r Registry) -> Self {
        Self {
            channel: ChannelMaker {
                extensions: ExtensionMakers::new(registry, Target::Channel),
                items: Vec::new(),
            },
        }
    }

    /// Maker pre-filled from a parsed feed: every extension value of the
    /// channel and of each item is staged again.
    ///
    /// `rss` must have been parsed (or built) with `registry`.
    pub fn from_rss(rss: &Rss, registry: &'r Registry) -> Result<Self> {
        let extensions = ExtensionMakers::from_host(registry, Target::Channel, &rss.channel.extensions)?;
        let items = rss
            .channel
            .items
            .iter()
            .map(|item| {
                Ok(ItemMaker {
                    extensions: ExtensionMakers::from_host(registry, Target::Item, &item.extensions)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "maker set up from feed: {} channel extension(s), {} item(s)",
            extensions.makers.len(),
            items.len()
        );
        Ok(Self { channel: ChannelMaker { extensions, items } })
    }

    pub fn channel(&mut self) -> &mut ChannelMaker<'r> {
        &mut self.channel
    }

    /// Assembles the feed: channel extensions first, then every item in order.
    ///
    /// The first failing commit aborts; its error names the failing instance,
    /// e.g. `channel.spotify_access`.
    pub fn to_feed(&mut self) -> Result<Rss> {
        let mut rss = Rss::default();
        self.channel.extensions.commit(&mut rss.channel.extensions)?;
        for item_maker in &mut self.channel.items {
            let mut item = Item::default();
            item_maker.extensions.commit(&mut item.extensions)?;
            rss.channel.items.push(item);
        }
        Ok(rss)
    }
}
