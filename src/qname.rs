//! Qualified names.
//!
//! Two names are equal when namespace URI and local name match, regardless of
//! the prefix used in the document. The listener table is keyed by
//! [`ExpandedName`]; lookups from tokenizer events use the borrowed
//! [`ExpandedNameRef`] so no key is allocated on the hot path.
//!
//! ## Identity
//!
//! Beide Varianten tragen einen vorberechneten Identity-Hash von
//! (uri, local_name). `Hash` schreibt nur diesen u64, damit owned und borrowed
//! Schluessel in derselben HashMap gefunden werden.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use ahash::AHasher;

/// Berechnet den Identity-Hash fuer (uri, local_name).
pub(crate) fn compute_identity(uri: &str, local_name: &str) -> u64 {
    let mut hasher = AHasher::default();
    uri.hash(&mut hasher);
    local_name.hash(&mut hasher);
    hasher.finish()
}

/// Semantic identity of an element: namespace URI + local name.
#[derive(Clone)]
pub struct ExpandedName {
    uri: Cow<'static, str>,
    local_name: Cow<'static, str>,
    identity: u64,
}

impl ExpandedName {
    pub fn new(uri: impl Into<Cow<'static, str>>, local_name: impl Into<Cow<'static, str>>) -> Self {
        let uri = uri.into();
        let local_name = local_name.into();
        let identity = compute_identity(&uri, &local_name);
        Self { uri, local_name, identity }
    }

    /// The namespace URI. Empty string means no namespace.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Borrowed view with the same identity.
    pub fn as_key(&self) -> ExpandedNameRef<'_> {
        ExpandedNameRef { uri: &self.uri, local_name: &self.local_name, identity: self.identity }
    }
}

impl fmt::Debug for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpandedName({self})")
    }
}

/// Clark-Notation: `{uri}local`.
impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            f.write_str(&self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.uri, self.local_name)
        }
    }
}

impl PartialEq for ExpandedName {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.uri == other.uri
            && self.local_name == other.local_name
    }
}

impl Eq for ExpandedName {}

impl Hash for ExpandedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Borrowed lookup key, equivalent to an [`ExpandedName`].
#[derive(Clone, Copy, Debug)]
pub struct ExpandedNameRef<'a> {
    uri: &'a str,
    local_name: &'a str,
    identity: u64,
}

impl<'a> ExpandedNameRef<'a> {
    pub fn new(uri: &'a str, local_name: &'a str) -> Self {
        Self { uri, local_name, identity: compute_identity(uri, local_name) }
    }

    pub fn uri(&self) -> &'a str {
        self.uri
    }

    pub fn local_name(&self) -> &'a str {
        self.local_name
    }
}

impl Hash for ExpandedNameRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl hashbrown::Equivalent<ExpandedName> for ExpandedNameRef<'_> {
    fn equivalent(&self, key: &ExpandedName) -> bool {
        self.identity == key.identity && self.uri == key.uri && self.local_name == key.local_name
    }
}

/// Name of an element or attribute as delivered by the tokenizer.
///
/// The prefix is kept for diagnostics only; it never takes part in comparisons.
#[derive(Debug, Clone)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub uri: String,
    pub local_name: String,
    pub prefix: Option<String>,
}

impl QName {
    pub fn new(uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self { uri: uri.into(), local_name: local_name.into(), prefix: None }
    }

    pub fn with_prefix(
        uri: impl Into<String>,
        local_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self { uri: uri.into(), local_name: local_name.into(), prefix: Some(prefix.into()) }
    }

    /// Lookup key for the listener table.
    pub fn expanded(&self) -> ExpandedNameRef<'_> {
        ExpandedNameRef::new(&self.uri, &self.local_name)
    }
}

/// Prefix spielt beim Vergleich keine Rolle.
impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(pfx) if !pfx.is_empty() => write!(f, "{pfx}:{}", self.local_name),
            _ => f.write_str(&self.local_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FastHashMap;

    #[test]
    fn expanded_name_equality_ignores_storage() {
        let a = ExpandedName::new("urn:x", "access");
        let b = ExpandedName::new(String::from("urn:x"), String::from("access"));
        assert_eq!(a, b);
        assert_ne!(a, ExpandedName::new("urn:y", "access"));
        assert_ne!(a, ExpandedName::new("urn:x", "partner"));
    }

    #[test]
    fn borrowed_key_finds_owned_entry() {
        let mut map: FastHashMap<ExpandedName, u32> = FastHashMap::default();
        map.insert(ExpandedName::new("urn:x", "access"), 7);
        assert_eq!(map.get(&ExpandedNameRef::new("urn:x", "access")), Some(&7));
        assert_eq!(map.get(&ExpandedNameRef::new("urn:other", "access")), None);
        assert_eq!(map.get(&ExpandedName::new("urn:x", "access").as_key()), Some(&7));
    }

    #[test]
    fn clark_notation_display() {
        assert_eq!(ExpandedName::new("urn:x", "access").to_string(), "{urn:x}access");
        assert_eq!(ExpandedName::new("", "rss").to_string(), "rss");
    }

    #[test]
    fn qname_prefix_not_significant() {
        let a = QName::with_prefix("urn:x", "access", "a");
        let b = QName::with_prefix("urn:x", "access", "b");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "a:access");
        assert_eq!(QName::new("", "item").to_string(), "item");
    }
}
