//! XML tokenizer.
//!
//! Wraps quick-xml's `NsReader` and produces namespace-resolved
//! [`XmlEvent`]s in document order. Comments, PIs and the DOCTYPE are dropped;
//! adjacent text, CDATA and character/entity references are coalesced into one
//! `Text` event. Empty elements yield `Start` followed by `End`; an element
//! written as `<a></a>` yields `Start`, `Text("")`, `End` so that empty
//! character content survives a round trip.

use std::borrow::Cow;

use memchr::memchr;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesCData, BytesStart, BytesText, Event};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::qname::QName;
use crate::{Error, Result};

/// One attribute of a start tag, namespace resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// Tokenizer event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start { name: QName, attributes: Vec<Attribute> },
    Text(String),
    End,
}

/// Tokenisiert XML aus einem String.
pub fn parse_events_from_str(xml: &str) -> Result<Vec<XmlEvent>> {
    let mut events = Vec::new();
    emit_events(xml.as_bytes(), |event| {
        events.push(event);
        Ok(())
    })?;
    Ok(events)
}

/// Streams events from `xml_reader` into `emit`.
///
/// Stops at the first error of either the reader or `emit`.
pub fn emit_events(
    xml_reader: impl std::io::Read,
    mut emit: impl FnMut(XmlEvent) -> Result<()>,
) -> Result<()> {
    let mut reader = NsReader::from_reader(std::io::BufReader::new(xml_reader));
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut depth: usize = 0;
    // Text-Coalescing: gepufferter Text wird vor jedem Element-Event geflusht.
    let mut pending_text: Option<String> = None;
    // Start-Tag ohne bisherigen Inhalt (fuer `<a></a>`).
    let mut bare_start = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                flush_pending_text(&mut pending_text, &mut emit)?;
                emit(start_event(&reader, &e)?)?;
                depth = depth.saturating_add(1);
                bare_start = true;
            }
            Ok(Event::Empty(e)) => {
                flush_pending_text(&mut pending_text, &mut emit)?;
                emit(start_event(&reader, &e)?)?;
                emit(XmlEvent::End)?;
                bare_start = false;
            }
            Ok(Event::End(_)) => {
                if bare_start && pending_text.is_none() {
                    emit(XmlEvent::Text(String::new()))?;
                }
                bare_start = false;
                flush_pending_text(&mut pending_text, &mut emit)?;
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::XmlParseError("unexpected end tag at depth 0".to_string())
                })?;
                emit(XmlEvent::End)?;
            }
            Ok(Event::Text(e)) => {
                if let Some(value) = decode_text(e)? {
                    push_text(&mut pending_text, depth, value)?;
                    bare_start = false;
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(value) = decode_cdata(e)? {
                    push_text(&mut pending_text, depth, value)?;
                    bare_start = false;
                }
            }
            Ok(Event::GeneralRef(e)) => {
                let ref_name = decode_utf8(e.as_ref())?;
                let resolved = if ref_name.starts_with('#') {
                    resolve_char_reference(&ref_name).map(String::from)
                } else {
                    resolve_predefined_entity(&ref_name).map(str::to_string)
                };
                // Unbekannte Entities (DTD) werden still ignoriert.
                if let Some(value) = resolved
                    && depth > 0
                {
                    coalesce_text(&mut pending_text, value);
                    bare_start = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {
                // Decl, Comment, PI, DocType: not part of the model.
            }
            Err(e) => {
                return Err(Error::XmlParseError(format!(
                    "parse XML error at {:?}: {e}",
                    reader.buffer_position()
                )));
            }
        }

        buf.clear();
    }

    if depth != 0 {
        return Err(Error::XmlParseError(format!("{depth} unclosed element(s) at end of input")));
    }
    flush_pending_text(&mut pending_text, &mut emit)
}

fn start_event(reader: &NsReader<impl std::io::BufRead>, e: &BytesStart<'_>) -> Result<XmlEvent> {
    let name = resolve_element_qname(reader, e.name())?;
    let mut attributes = Vec::new();

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let key = attr.key.as_ref();
        // Namespace-Deklarationen sind bereits im Resolver.
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = resolve_attribute_qname(reader, attr.key)?;
        let raw = std::str::from_utf8(attr.value.as_ref())
            .map_err(|er| Error::XmlParseError(er.to_string()))?;
        let value = unescape_attr_value(raw);
        let value = normalize_line_endings(value.as_ref()).into_owned();
        attributes.push(Attribute { name, value });
    }

    Ok(XmlEvent::Start { name, attributes })
}

fn push_text(pending_text: &mut Option<String>, depth: usize, value: String) -> Result<()> {
    if depth == 0 {
        if !value.trim().is_empty() {
            return Err(Error::XmlParseError("character data outside root element".to_string()));
        }
        return Ok(());
    }
    coalesce_text(pending_text, value);
    Ok(())
}

fn flush_pending_text(
    pending_text: &mut Option<String>,
    emit: &mut impl FnMut(XmlEvent) -> Result<()>,
) -> Result<()> {
    if let Some(text) = pending_text.take() {
        emit(XmlEvent::Text(text))?;
    }
    Ok(())
}

fn coalesce_text(pending_text: &mut Option<String>, value: String) {
    match pending_text {
        Some(existing) => existing.push_str(&value),
        None => *pending_text = Some(value),
    }
}

fn resolve_element_qname(
    reader: &NsReader<impl std::io::BufRead>,
    name: XmlQName<'_>,
) -> Result<QName> {
    let (ns, local) = reader.resolver().resolve_element(name);
    make_qname(resolve_to_uri(ns)?, local.as_ref(), name.as_ref())
}

fn resolve_attribute_qname(
    reader: &NsReader<impl std::io::BufRead>,
    name: XmlQName<'_>,
) -> Result<QName> {
    let (ns, local) = reader.resolver().resolve_attribute(name);
    make_qname(resolve_to_uri(ns)?, local.as_ref(), name.as_ref())
}

fn make_qname(uri: String, local: &[u8], raw_name: &[u8]) -> Result<QName> {
    let local_name = decode_utf8(local)?;
    match split_prefix(raw_name) {
        Some(prefix) => Ok(QName::with_prefix(uri, local_name, decode_utf8(prefix)?)),
        None => Ok(QName::new(uri, local_name)),
    }
}

fn resolve_to_uri(ns: ResolveResult<'_>) -> Result<String> {
    match ns {
        ResolveResult::Bound(ns) => decode_utf8(ns.as_ref()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(Error::XmlParseError(format!(
            "unknown namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn split_prefix(name: &[u8]) -> Option<&[u8]> {
    let pos = memchr(b':', name)?;
    Some(&name[..pos])
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|er| Error::XmlParseError(er.to_string()))
}

fn decode_text(e: BytesText<'_>) -> Result<Option<String>> {
    let raw = std::str::from_utf8(&e).map_err(|er| Error::XmlParseError(er.to_string()))?;
    let text = quick_xml::escape::unescape(raw).map_err(|er| Error::XmlParseError(er.to_string()))?;
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(normalize_line_endings(text.as_ref()).into_owned()))
    }
}

fn decode_cdata(e: BytesCData<'_>) -> Result<Option<String>> {
    let text = String::from_utf8(e.into_inner().into_owned())
        .map_err(|er| Error::XmlParseError(er.to_string()))?;
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(normalize_line_endings(&text).into_owned()))
    }
}

/// Loest Zeichen- und vordefinierte Entities in Attributwerten auf.
/// Unbekannte Entities bleiben unveraendert.
fn unescape_attr_value(value: &str) -> Cow<'_, str> {
    let bytes = value.as_bytes();
    let Some(mut amp) = memchr(b'&', bytes) else {
        return Cow::Borrowed(value);
    };

    let mut out = String::with_capacity(value.len());
    let mut pos = 0;

    loop {
        out.push_str(&value[pos..amp]);
        let Some(rel_semi) = memchr(b';', &bytes[amp + 1..]) else {
            out.push_str(&value[amp..]);
            return Cow::Owned(out);
        };
        let semi = amp + 1 + rel_semi;
        let name = &value[amp + 1..semi];
        if name.starts_with('#') {
            match resolve_char_reference(name) {
                Some(ch) => out.push(ch),
                None => out.push_str(&value[amp..=semi]),
            }
        } else if let Some(predef) = resolve_predefined_entity(name) {
            out.push_str(predef);
        } else {
            out.push_str(&value[amp..=semi]);
        }
        pos = semi + 1;
        match memchr(b'&', &bytes[pos..]) {
            Some(rel) => amp = pos + rel,
            None => {
                out.push_str(&value[pos..]);
                return Cow::Owned(out);
            }
        }
    }
}

/// XML 1.0 Sec. 2.11: \r\n -> \n, alleinstehende \r -> \n
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

/// `#49` (dezimal) oder `#x31` (hexadezimal), ohne `&` und `;`.
fn resolve_char_reference(ref_name: &str) -> Option<char> {
    let digits = ref_name.strip_prefix('#')?;
    let code_point = if let Some(hex) = digits.strip_prefix('x') {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<u32>().ok()?
    };
    char::from_u32(code_point)
}
