//! Central error types for the extension schema machinery.
//!
//! Every failure of registration, parsing, building or assembly surfaces as one
//! [`Error`] variant. Only [`Error::NamespaceMismatch`] is recovered locally (the
//! listener ignores the offending element); everything else is returned to the
//! immediate caller.

use core::fmt;
use std::borrow::Cow;

/// All error types of the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A descriptor name is registered twice within the same owner.
    ///
    /// Fatal at startup: the registry is never frozen with a conflicting table.
    DuplicateElement {
        /// Element type or schema that already owns the name.
        owner: Cow<'static, str>,
        /// The conflicting descriptor name.
        name: Cow<'static, str>,
    },
    /// A lookup by name found no descriptor (or no maker field).
    UnknownElement {
        /// Element type or schema that was searched.
        owner: Cow<'static, str>,
        /// The name that was not found.
        name: String,
    },
    /// An accessor was used on a descriptor of a different kind,
    /// e.g. `child()` on an attribute.
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    /// An incoming element has the right local name but the wrong namespace URI.
    NamespaceMismatch {
        name: String,
        expected: Cow<'static, str>,
        found: String,
    },
    /// A namespace with a URI but no prefix: the serializer could not
    /// qualify its elements, so it is rejected when the type is declared.
    UnprefixedNamespace {
        owner: Cow<'static, str>,
        uri: Cow<'static, str>,
    },
    /// A raw value cannot be coerced to the declared scalar type.
    TypeCoercion {
        name: String,
        value: String,
        expected: &'static str,
    },
    /// Commit of a present extension instance with required fields unset.
    ///
    /// `missing` is in schema declaration order.
    MissingRequiredField {
        path: String,
        missing: Vec<String>,
    },
    /// XML tokenizing failed.
    XmlParseError(String),
    /// Writing serialized output failed.
    IoError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateElement { owner, name } => {
                write!(f, "element '{name}' is already registered in '{owner}'")
            }
            Self::UnknownElement { owner, name } => {
                write!(f, "unknown element '{name}' in '{owner}'")
            }
            Self::KindMismatch { name, expected, found } => {
                write!(f, "element '{name}' is {found}, expected {expected}")
            }
            Self::NamespaceMismatch { name, expected, found } => {
                if found.is_empty() {
                    write!(f, "element '{name}' has no namespace, expected '{expected}'")
                } else {
                    write!(f, "element '{name}' has namespace '{found}', expected '{expected}'")
                }
            }
            Self::UnprefixedNamespace { owner, uri } => {
                write!(f, "namespace '{uri}' used by '{owner}' has no prefix")
            }
            Self::TypeCoercion { name, value, expected } => {
                write!(f, "value '{value}' of '{name}' is not a valid {expected}")
            }
            Self::MissingRequiredField { path, missing } => {
                write!(f, "{path}: required field(s) not set: {}", missing.join(", "))
            }
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erstellt einen `DuplicateElement` Fehler.
    pub fn duplicate_element(
        owner: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::DuplicateElement { owner: owner.into(), name: name.into() }
    }

    /// Erstellt einen `UnknownElement` Fehler.
    pub fn unknown_element(owner: impl Into<Cow<'static, str>>, name: impl Into<String>) -> Self {
        Self::UnknownElement { owner: owner.into(), name: name.into() }
    }

    /// Erstellt einen `TypeCoercion` Fehler.
    pub fn type_coercion(
        name: impl Into<String>,
        value: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::TypeCoercion { name: name.into(), value: value.into(), expected }
    }

    /// Erstellt einen `MissingRequiredField` Fehler.
    pub fn missing_required(path: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingRequiredField { path: path.into(), missing }
    }

    /// Die fehlenden Feldnamen, falls es ein `MissingRequiredField` ist.
    pub fn missing_fields(&self) -> Option<&[String]> {
        match self {
            Self::MissingRequiredField { missing, .. } => Some(missing),
            _ => None,
        }
    }
}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
