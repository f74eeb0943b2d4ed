//! Namespaced resource identifiers (`namespace:path`).
//!
//! Used for block materials, block tags and multiblock type ids. Both parts
//! must be non-empty and use only `[a-z0-9._-]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated `namespace:path` identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    namespace: String,
    path: String,
}

/// Errors produced when parsing an [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The input has no `:` separator.
    #[error("identifier must be in the format 'namespace:path', got {0:?}")]
    MissingSeparator(String),
    /// The namespace is empty or contains a character outside `[a-z0-9._-]`.
    #[error("invalid identifier namespace: {0:?}")]
    InvalidNamespace(String),
    /// The path is empty or contains a character outside `[a-z0-9._-]`.
    #[error("invalid identifier path: {0:?}")]
    InvalidPath(String),
}

impl Identifier {
    /// Creates an identifier from its two parts.
    pub fn new(namespace: &str, path: &str) -> Result<Self, IdentifierError> {
        if !is_valid_part(namespace) {
            return Err(IdentifierError::InvalidNamespace(namespace.to_string()));
        }
        if !is_valid_part(path) {
            return Err(IdentifierError::InvalidPath(path.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        })
    }

    /// Builds an identifier from parts known to be valid at compile time.
    pub(crate) fn from_static(namespace: &'static str, path: &'static str) -> Self {
        debug_assert!(is_valid_part(namespace) && is_valid_part(path));
        Self {
            namespace: namespace.to_string(),
            path: path.to_string(),
        }
    }

    /// Parses `namespace:path`. The split happens at the first `:`.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let Some((namespace, path)) = value.split_once(':') else {
            return Err(IdentifierError::MissingSeparator(value.to_string()));
        };
        Self::new(namespace, path)
    }

    /// The namespace part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The path part.
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-'))
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.to_string()
    }
}
