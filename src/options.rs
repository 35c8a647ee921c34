//! Parse options.
//!
//! # Beispiel
//!
//! ```
//! use feedns::options::ParseOptions;
//!
//! let opts = ParseOptions::default()
//!     .with_validate(false)
//!     .with_ignore_unknown_element(false);
//!
//! assert!(!opts.validate());
//! assert!(!opts.ignore_unknown_element());
//! assert!(!opts.trim_text());
//! ```

/// Controls how the listener reacts to malformed extension content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    validate: bool,
    ignore_unknown_element: bool,
    trim_text: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self { validate: true, ignore_unknown_element: true, trim_text: false }
    }
}

impl ParseOptions {
    /// Lenient parse: coercion failures are logged and the value dropped.
    pub fn lenient() -> Self {
        Self::default().with_validate(false)
    }

    /// Coercion failures abort the parse (default: true).
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Unknown children of extension elements are skipped instead of
    /// rejected with `UnknownElement` (default: true).
    pub fn with_ignore_unknown_element(mut self, ignore: bool) -> Self {
        self.ignore_unknown_element = ignore;
        self
    }

    /// Whitespace um Text-Elemente und Zeicheninhalt entfernen (default: false).
    ///
    /// Attribute values are never trimmed. Boolean, tri-state and list values
    /// ignore surrounding whitespace regardless of this flag.
    pub fn with_trim_text(mut self, trim: bool) -> Self {
        self.trim_text = trim;
        self
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn ignore_unknown_element(&self) -> bool {
        self.ignore_unknown_element
    }

    pub fn trim_text(&self) -> bool {
        self.trim_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ParseOptions::default();
        assert!(opts.validate());
        assert!(opts.ignore_unknown_element());
        assert!(!opts.trim_text());
        assert!(!ParseOptions::lenient().validate());
        assert!(ParseOptions::default().with_trim_text(true).trim_text());
    }
}
