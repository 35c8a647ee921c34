//! Scalar values of attribute and text descriptors.
//!
//! Four declared types:
//! - `String`: taken verbatim.
//! - `Boolean`: the XML Schema lexical forms `true`, `false`, `1`, `0`.
//! - `YesOther`: the tri-state used by podcast namespaces (`yes`, `no`, anything else).
//! - `CommaList`: comma-separated tokens, whitespace around tokens trimmed.
//!
//! Coercion happens at set time; a value that cannot be coerced is rejected with
//! [`Error::TypeCoercion`] and the previous value stays in place.

use std::borrow::Cow;
use std::fmt;

use crate::{Error, Result};

/// Declared type of a scalar descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    String,
    Boolean,
    YesOther,
    CommaList,
}

impl ValueType {
    /// Human readable name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::YesOther => "yes/no/other value",
            Self::CommaList => "comma-separated list",
        }
    }

    /// Coerces a raw lexical value for the field `field`.
    pub fn coerce(self, field: &str, raw: &str) -> Result<ScalarValue> {
        match self {
            Self::String => Ok(ScalarValue::String(raw.to_string())),
            Self::Boolean => parse_boolean(raw)
                .map(ScalarValue::Boolean)
                .ok_or_else(|| Error::type_coercion(field, raw, self.name())),
            Self::YesOther => TriState::parse(raw)
                .map(ScalarValue::TriState)
                .ok_or_else(|| Error::type_coercion(field, raw, self.name())),
            Self::CommaList => Ok(ScalarValue::List(split_list(raw))),
        }
    }

    /// Prueft einen bereits typisierten Wert; Strings werden nachtraeglich coerced.
    pub fn convert(self, field: &str, value: ScalarValue) -> Result<ScalarValue> {
        match (self, value) {
            (Self::String, v @ ScalarValue::String(_))
            | (Self::Boolean, v @ ScalarValue::Boolean(_))
            | (Self::YesOther, v @ ScalarValue::TriState(_))
            | (Self::CommaList, v @ ScalarValue::List(_)) => Ok(v),
            (_, ScalarValue::String(raw)) => self.coerce(field, &raw),
            (Self::YesOther, ScalarValue::Boolean(b)) => Ok(ScalarValue::TriState(b.into())),
            (_, other) => Err(Error::type_coercion(field, other.lexical(), self.name())),
        }
    }
}

/// XML Schema boolean: `true`/`1` and `false`/`0`.
fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        s if s.eq_ignore_ascii_case("true") => Some(true),
        s if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Yes/no/other tri-state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriState {
    Yes,
    No,
    /// Any other non-empty value, kept verbatim (e.g. `clean`).
    Other(String),
}

impl TriState {
    /// Leerer Wert ist kein gueltiger Tri-State.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.eq_ignore_ascii_case("yes") {
            Some(Self::Yes)
        } else if trimmed.eq_ignore_ascii_case("no") {
            Some(Self::No)
        } else {
            Some(Self::Other(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Other(s) => s,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::Yes } else { Self::No }
    }
}

/// A coerced scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    String(String),
    Boolean(bool),
    TriState(TriState),
    List(Vec<String>),
}

impl ScalarValue {
    /// Lexical form used for serialization.
    pub fn lexical(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s),
            Self::Boolean(true) => Cow::Borrowed("true"),
            Self::Boolean(false) => Cow::Borrowed("false"),
            Self::TriState(t) => Cow::Borrowed(t.as_str()),
            Self::List(items) => Cow::Owned(items.join(",")),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_tri_state(&self) -> Option<&TriState> {
        match self {
            Self::TriState(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<TriState> for ScalarValue {
    fn from(value: TriState) -> Self {
        Self::TriState(value)
    }
}

impl From<Vec<String>> for ScalarValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}
