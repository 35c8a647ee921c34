//! Namespace bindings (prefix + URI).

use std::fmt;

/// A namespace an extension element lives in.
///
/// `Namespace::NONE` is used for unqualified attributes and for the host-level
/// root of a schema, which is never serialized as an element of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

impl Namespace {
    /// Kein Namespace (unqualifizierte Attribute).
    pub const NONE: Namespace = Namespace { prefix: "", uri: "" };

    pub const fn new(prefix: &'static str, uri: &'static str) -> Self {
        Self { prefix, uri }
    }

    pub fn is_none(&self) -> bool {
        self.uri.is_empty()
    }

    /// URI without prefix; cannot be written as `prefix:name`.
    pub fn is_unprefixed(&self) -> bool {
        !self.uri.is_empty() && self.prefix.is_empty()
    }

    /// `prefix:local` or just `local` without a prefix.
    pub fn qualify(&self, local_name: &str) -> String {
        if self.prefix.is_empty() {
            local_name.to_string()
        } else {
            format!("{}:{local_name}", self.prefix)
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            write!(f, "{}", self.uri)
        } else {
            write!(f, "{}={}", self.prefix, self.uri)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_with_and_without_prefix() {
        let ns = Namespace::new("spotify", "urn:spotify");
        assert_eq!(ns.qualify("access"), "spotify:access");
        assert_eq!(Namespace::NONE.qualify("id"), "id");
        assert!(Namespace::NONE.is_none());
        assert!(!ns.is_none());
        assert!(Namespace::new("", "urn:x").is_unprefixed());
        assert!(!ns.is_unprefixed());
        assert!(!Namespace::NONE.is_unprefixed());
    }
}
