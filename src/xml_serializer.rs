//! Extension elements → XML.
//!
//! Writes parse-side [`Element`]s back as XML text: attributes first, then
//! character content, then child elements, everything in declaration order.
//! Element names get the prefix of their declared namespace; the prefixes are
//! declared once on `<rss>` by [`rss_to_xml`].
//!
//! APIs:
//! - `element_to_xml()` / `write_element()`: a single extension element.
//! - `rss_to_xml()` / `rss_to_xml_writer()`: a whole host document.

use std::io::Write;

use crate::document::{Item, RSS_VERSION, Rss};
use crate::element::{Element, Entry};
use crate::host::Extensions;
use crate::namespace::Namespace;
use crate::schema::{ElementDescriptor, ElementKind};
use crate::value::ScalarValue;
use crate::{Error, Result};

/// Serialisiert ein Extension-Element als XML-String.
pub fn element_to_xml(element: &Element) -> Result<String> {
    let mut buf = Vec::new();
    write_element(&mut buf, element)?;
    into_string(buf)
}

/// Schreibt ein Extension-Element in einen Writer.
pub fn write_element(writer: &mut impl Write, element: &Element) -> Result<()> {
    let ty = element.element_type();
    write_compound(writer, ty.namespace(), ty.name(), element)
}

/// Serialisiert ein RSS-Dokument als XML-String.
pub fn rss_to_xml(rss: &Rss) -> Result<String> {
    let mut buf = Vec::new();
    rss_to_xml_writer(rss, &mut buf)?;
    into_string(buf)
}

/// Schreibt ein RSS-Dokument direkt in einen Writer.
pub fn rss_to_xml_writer(rss: &Rss, mut writer: impl Write) -> Result<()> {
    let mut namespaces = Vec::new();
    collect_extension_namespaces(&rss.channel.extensions, &mut namespaces);
    for item in &rss.channel.items {
        collect_extension_namespaces(&item.extensions, &mut namespaces);
    }

    w(&mut writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"")?;
    let version = if rss.version.is_empty() { RSS_VERSION } else { rss.version.as_str() };
    write_escaped_attr(&mut writer, version)?;
    w(&mut writer, "\"")?;
    for ns in &namespaces {
        w(&mut writer, " xmlns:")?;
        w(&mut writer, ns.prefix)?;
        w(&mut writer, "=\"")?;
        write_escaped_attr(&mut writer, ns.uri)?;
        w(&mut writer, "\"")?;
    }
    w(&mut writer, "><channel>")?;
    write_extensions(&mut writer, &rss.channel.extensions)?;
    for item in &rss.channel.items {
        write_item(&mut writer, item)?;
    }
    w(&mut writer, "</channel></rss>\n")?;
    writer.flush().map_err(io_err)
}

fn write_item(writer: &mut impl Write, item: &Item) -> Result<()> {
    w(writer, "<item>")?;
    write_extensions(writer, &item.extensions)?;
    w(writer, "</item>")
}

/// Extension-Roots werden nicht selbst geschrieben, nur ihre Slots.
fn write_extensions(writer: &mut impl Write, extensions: &Extensions) -> Result<()> {
    for (_, root) in extensions.iter() {
        write_children(writer, root)?;
    }
    Ok(())
}

/// Prefixed namespaces used anywhere beneath the host's extension roots.
fn collect_extension_namespaces(extensions: &Extensions, out: &mut Vec<Namespace>) {
    for (_, root) in extensions.iter() {
        collect_namespaces(root, out);
    }
}

fn collect_namespaces(element: &Element, out: &mut Vec<Namespace>) {
    for (descriptor, entry) in element.entries() {
        match entry {
            Entry::Value(Some(_)) => add_namespace(out, descriptor.namespace()),
            Entry::Child(Some(child)) => {
                add_namespace(out, descriptor.namespace());
                collect_namespaces(child, out);
            }
            Entry::Children(children) => {
                for child in children {
                    add_namespace(out, descriptor.namespace());
                    collect_namespaces(child, out);
                }
            }
            _ => {}
        }
    }
}

fn add_namespace(out: &mut Vec<Namespace>, ns: Namespace) {
    if !ns.is_none() && !ns.prefix.is_empty() && !out.contains(&ns) {
        out.push(ns);
    }
}

// ============================================================================
// Elemente
// ============================================================================

fn write_compound(writer: &mut impl Write, ns: Namespace, name: &str, element: &Element) -> Result<()> {
    w(writer, "<")?;
    write_name(writer, ns, name)?;
    for (descriptor, entry) in element.entries() {
        if descriptor.kind() == ElementKind::Attribute
            && let Entry::Value(Some(value)) = entry
        {
            w(writer, " ")?;
            write_name(writer, descriptor.namespace(), descriptor.name())?;
            w(writer, "=\"")?;
            write_escaped_attr(writer, &value.lexical())?;
            w(writer, "\"")?;
        }
    }

    let has_children = element.entries().any(|(d, entry)| has_child_output(d, entry));
    if element.content().is_none() && !has_children {
        return w(writer, "/>");
    }
    w(writer, ">")?;
    if let Some(content) = element.content() {
        write_escaped_text(writer, &content.lexical())?;
    }
    write_children(writer, element)?;
    w(writer, "</")?;
    write_name(writer, ns, name)?;
    w(writer, ">")
}

fn has_child_output(descriptor: &ElementDescriptor, entry: Entry<'_>) -> bool {
    match entry {
        Entry::Value(Some(_)) => descriptor.kind() == ElementKind::Text,
        Entry::Child(Some(_)) => true,
        Entry::Children(children) => !children.is_empty(),
        _ => false,
    }
}

/// Text- und Kind-Elemente in Deklarationsreihenfolge.
fn write_children(writer: &mut impl Write, element: &Element) -> Result<()> {
    for (descriptor, entry) in element.entries() {
        match entry {
            Entry::Value(Some(value)) if descriptor.kind() == ElementKind::Text => {
                write_text_element(writer, descriptor, value)?;
            }
            Entry::Child(Some(child)) => {
                write_compound(writer, descriptor.namespace(), descriptor.name(), child)?;
            }
            Entry::Children(children) => {
                for child in children {
                    write_compound(writer, descriptor.namespace(), descriptor.name(), child)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn write_text_element(writer: &mut impl Write, descriptor: &ElementDescriptor, value: &ScalarValue) -> Result<()> {
    w(writer, "<")?;
    write_name(writer, descriptor.namespace(), descriptor.name())?;
    w(writer, ">")?;
    write_escaped_text(writer, &value.lexical())?;
    w(writer, "</")?;
    write_name(writer, descriptor.namespace(), descriptor.name())?;
    w(writer, ">")
}

fn write_name(writer: &mut impl Write, ns: Namespace, name: &str) -> Result<()> {
    if !ns.prefix.is_empty() {
        w(writer, ns.prefix)?;
        w(writer, ":")?;
    }
    w(writer, name)
}

// ============================================================================
// Hilfsfunktionen
// ============================================================================

fn into_string(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|_| Error::IoError("XML output is not valid UTF-8".into()))
}

/// io::Error → Error Konvertierung.
fn io_err(e: std::io::Error) -> Error {
    Error::IoError(e.to_string())
}

/// Schreibt einen String als Bytes in den Writer.
#[inline]
fn w(writer: &mut impl Write, s: &str) -> Result<()> {
    writer.write_all(s.as_bytes()).map_err(io_err)
}

/// XML-Escaping mit memchr3: sucht drei Zeichen gleichzeitig und ersetzt sie.
/// Grosse Bloecke ohne Escape-Zeichen werden in einem Stueck geschrieben.
fn write_escaped_memchr3(
    w: &mut impl Write,
    s: &str,
    needle: [u8; 3],
    replacement: [&[u8]; 3],
) -> Result<()> {
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        match memchr::memchr3(needle[0], needle[1], needle[2], &bytes[start..]) {
            Some(offset) => {
                let pos = start + offset;
                if start < pos {
                    w.write_all(&bytes[start..pos]).map_err(io_err)?;
                }
                let idx = if bytes[pos] == needle[0] {
                    0
                } else if bytes[pos] == needle[1] {
                    1
                } else {
                    2
                };
                w.write_all(replacement[idx]).map_err(io_err)?;
                start = pos + 1;
            }
            None => {
                w.write_all(&bytes[start..]).map_err(io_err)?;
                break;
            }
        }
    }
    Ok(())
}

/// XML-Escaping fuer Text-Inhalt: & < > → &amp; &lt; &gt;
fn write_escaped_text(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'>'], [b"&amp;", b"&lt;", b"&gt;"])
}

/// XML-Escaping fuer Attribut-Werte: & < " → &amp; &lt; &quot;
fn write_escaped_attr(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'"'], [b"&amp;", b"&lt;", b"&quot;"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::schema::{ElementDescriptor as D, ElementType, Target};
    use crate::spotify;
    use crate::value::ValueType;

    #[test]
    fn spotify_access_element() {
        let schema = registry::global().lookup(spotify::EXTENSION, Target::Channel).unwrap();
        let ty = schema.lookup("access").unwrap().element_type().unwrap().clone();
        let mut access = Element::new(ty);
        access.child_mut("partner").unwrap().set("id", "a&b").unwrap();
        access.child_mut("sandbox").unwrap().set("enabled", "1").unwrap();
        assert_eq!(
            element_to_xml(&access).unwrap(),
            r#"<spotify:access><partner id="a&amp;b"/><sandbox enabled="true"/></spotify:access>"#
        );
    }

    #[test]
    fn text_content_and_lists() {
        let ns = Namespace::new("ex", "urn:example");
        let category = ElementType::builder("category", ns)
            .content(ValueType::String)
            .with(D::attribute("scheme", ValueType::String))
            .unwrap()
            .build()
            .unwrap();
        let ty = ElementType::builder("show", ns)
            .with(D::text("keywords", ns, ValueType::CommaList))
            .unwrap()
            .with(D::repeated("category", category))
            .unwrap()
            .build()
            .unwrap();
        let mut show = Element::new(ty);
        show.set("keywords", "a, b").unwrap();
        let c = show.push_child("category").unwrap();
        c.set_content("x < y").unwrap();
        c.set("scheme", "\"s\"").unwrap();
        assert_eq!(
            element_to_xml(&show).unwrap(),
            r#"<ex:show><ex:keywords>a,b</ex:keywords><ex:category scheme="&quot;s&quot;">x &lt; y</ex:category></ex:show>"#
        );
    }

    #[test]
    fn rss_declares_used_namespaces_only() {
        let empty = rss_to_xml(&Rss::default()).unwrap();
        assert!(!empty.contains("xmlns:"), "{empty}");
        assert!(empty.contains("<rss version=\"2.0\"><channel></channel></rss>"), "{empty}");

        let schema = registry::global().lookup(spotify::EXTENSION, Target::Item).unwrap();
        let mut item = Item::default();
        item.extensions
            .get_or_insert(schema)
            .child_mut("access")
            .unwrap()
            .child_mut("entitlement")
            .unwrap()
            .set("name", "gold")
            .unwrap();
        let mut rss = Rss::default();
        rss.channel.items.push(item);
        let xml = rss_to_xml(&rss).unwrap();
        assert!(xml.contains(&format!("xmlns:spotify=\"{}\"", spotify::URI)), "{xml}");
        assert!(
            xml.contains(r#"<item><spotify:access><entitlement name="gold"/></spotify:access></item>"#),
            "{xml}"
        );
    }
}
