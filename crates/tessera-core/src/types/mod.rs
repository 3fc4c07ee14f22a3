//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Tessera core:
//! - Content addresses (`Cid`)
//! - Entity kinds and part type tags (`EntityKind`, `TypeTag`)
//! - Literal part values (`PartValue`)
//! - Error types (`TesseraError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` so they can key a `BTreeMap`
//! - Serialize to exactly one wire form
//! - Carry no floating-point data

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// CONTENT ADDRESS
// =============================================================================

/// Address of an immutable record in a content-addressed store.
///
/// A `Cid` is an opaque, whitespace-free token. The built-in stores derive it
/// from the BLAKE3 digest of the record's canonical bytes; external stores
/// (e.g. an IPFS node) hand back their own addresses. Either way, identical
/// bytes always map to the identical address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Parse an address, rejecting empty strings and embedded whitespace.
    pub fn parse(s: impl Into<String>) -> Result<Self, TesseraError> {
        let s = s.into();
        if is_token(&s) {
            Ok(Self(s))
        } else {
            Err(TesseraError::Format {
                record: "Cid",
                reason: format!("not an address: {:?}", s),
            })
        }
    }

    /// Compute the address of `bytes` (lowercase hex BLAKE3 digest).
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// Get the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cid {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cid {
    type Error = TesseraError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

/// A non-empty string containing no whitespace.
#[must_use]
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}

// =============================================================================
// ENTITY KIND
// =============================================================================

/// The two kinds of entity a definition may describe.
///
/// A `thing` is a standalone object (a profile, a post); an `action` relates
/// things to each other (a comment, a like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Thing,
    Action,
}

impl EntityKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thing => "thing",
            Self::Action => "action",
        }
    }

    /// Parse a wire name. Returns `None` for anything but `thing`/`action`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "thing" => Some(Self::Thing),
            "action" => Some(Self::Action),
            _ => None,
        }
    }

    /// The part type tag that references an entity of this kind.
    #[must_use]
    pub const fn as_tag(self) -> TypeTag {
        match self {
            Self::Thing => TypeTag::Thing,
            Self::Action => TypeTag::Action,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// TYPE TAGS
// =============================================================================

/// The closed set of types a definition part may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Integer,
    Boolean,
    Url,
    FileInfo,
    EntityDefinition,
    Thing,
    Action,
}

impl TypeTag {
    /// Every tag, in declaration order.
    pub const ALL: [TypeTag; 8] = [
        Self::String,
        Self::Integer,
        Self::Boolean,
        Self::Url,
        Self::FileInfo,
        Self::EntityDefinition,
        Self::Thing,
        Self::Action,
    ];

    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::FileInfo => "file_info",
            Self::EntityDefinition => "entity_definition",
            Self::Thing => "thing",
            Self::Action => "action",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == s)
    }

    /// True for tags whose value is checked without touching the store.
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        matches!(
            self,
            Self::String | Self::Integer | Self::Boolean | Self::Url
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PART VALUES
// =============================================================================

/// A literal value stored in an entity part.
///
/// Integers travel as decimal-digit strings and references as address
/// strings, so conforming entities only carry JSON strings and booleans.
/// Any other JSON value decodes as `Other` and fails every tag check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartValue {
    Boolean(bool),
    Text(String),
    Other(serde_json::Value),
}

impl PartValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The string payload, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Boolean(_) | Self::Other(_) => None,
        }
    }

    /// The boolean payload, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::Text(_) | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for PartValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Other(v) => write!(f, "{}", v),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Tessera core.
///
/// - No silent failures
/// - Use `Result<T, TesseraError>` for fallible operations
/// - Validation failures never leave partial writes behind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TesseraError {
    /// A record had the wrong field set or a malformed value.
    #[error("Format error in {record}: {reason}")]
    Format { record: &'static str, reason: String },

    /// An entity definition has an invalid shape.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A part value does not satisfy its declared type tag.
    #[error("Part `{part}` is not a valid {expected}: {reason}")]
    TypeMismatch {
        part: String,
        expected: TypeTag,
        reason: String,
    },

    /// A referenced address does not resolve, or resolves to the wrong kind.
    #[error("Part `{part}` references {cid}: {reason}")]
    Reference {
        part: String,
        cid: Cid,
        reason: String,
    },

    /// Definition and entity disagree on the protocol version.
    #[error("Mismatched protocol versions: definition {definition}, entity {entity}")]
    ProtocolVersionMismatch { definition: String, entity: String },

    /// The entity declares a different type than the definition it is checked against.
    #[error("Mismatched entity types: expected {expected}, found {found}")]
    EntityTypeMismatch { expected: Cid, found: Cid },

    /// The entity's part names differ from the definition's.
    #[error("Different parts: missing {missing:?}, unexpected {unexpected:?}")]
    PartsMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A spine push does not continue the covered key range.
    #[error("Spine push out of order: expected first key {expected}, found {found}")]
    SpineOrder { expected: u64, found: u64 },

    /// The store has no object at this address.
    #[error("Object not found: {0}")]
    MissingObject(Cid),

    /// The store backend failed to serve a put/get/publish/resolve.
    #[error("Store error: {0}")]
    Store(String),

    /// The published root moved since it was read.
    #[error("Root conflict: expected {expected:?}, found {found:?}")]
    RootConflict {
        expected: Option<Cid>,
        found: Option<Cid>,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred outside the store (input files, sockets).
    #[error("I/O error: {0}")]
    Io(String),
}

impl TesseraError {
    /// Shorthand for a [`TesseraError::Format`] error.
    pub fn format(record: &'static str, reason: impl Into<String>) -> Self {
        Self::Format {
            record,
            reason: reason.into(),
        }
    }

    /// True when the error says the *input* is unacceptable, as opposed to
    /// the infrastructure failing. Rejections are reported, never retried.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Format { .. }
                | Self::Schema(_)
                | Self::TypeMismatch { .. }
                | Self::Reference { .. }
                | Self::ProtocolVersionMismatch { .. }
                | Self::EntityTypeMismatch { .. }
                | Self::PartsMismatch { .. }
                | Self::MissingObject(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
