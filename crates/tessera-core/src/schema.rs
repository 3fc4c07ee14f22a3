//! # Schema Records
//!
//! Record types that describe and carry typed content:
//! - `FileInfo`: metadata pointing at raw file bytes
//! - `EntityDefinition`: the schema an entity type must satisfy
//! - `Entity`: one published, schema-conforming record
//!
//! plus the literal predicates behind each primitive type tag. Checks that
//! need the store (references to other records) live in `validator`.

use crate::canonical::{self, Record, json_kind};
use crate::primitives::{MAX_PART_NAME_LENGTH, MAX_PARTS};
use crate::types::is_token;
use crate::{Cid, EntityKind, PartValue, TesseraError, TypeTag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Part name -> declared type.
pub type PartsSchema = BTreeMap<String, TypeTag>;

/// Part name -> literal value.
pub type PartValues = BTreeMap<String, PartValue>;

// =============================================================================
// PREDICATES
// =============================================================================

/// Membership test against the closed tag set.
#[must_use]
pub fn is_valid_type_tag(tag: &str) -> bool {
    TypeTag::parse(tag).is_some()
}

/// Part names match `[a-z0-9_]+`.
#[must_use]
pub fn is_part_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_PART_NAME_LENGTH
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Integers are non-negative decimal-digit strings of any length.
#[must_use]
pub fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// URLs are whitespace-free tokens.
#[must_use]
pub fn is_url(s: &str) -> bool {
    is_token(s)
}

/// File types are extensions or other whitespace-free text.
#[must_use]
pub fn is_file_type(s: &str) -> bool {
    is_token(s)
}

/// Check a literal value against a primitive tag.
///
/// Returns the reason on failure. Non-primitive tags are a caller error
/// and always fail here.
pub fn check_primitive(tag: TypeTag, value: &PartValue) -> Result<(), String> {
    let ok = match (tag, value) {
        (TypeTag::String, PartValue::Text(_)) => true,
        (TypeTag::Integer, PartValue::Text(s)) => is_integer(s),
        (TypeTag::Boolean, PartValue::Boolean(_)) => true,
        (TypeTag::Url, PartValue::Text(s)) => is_url(s),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("got {}", value))
    }
}

/// Validate an untyped parts definition.
///
/// Every key must be a part name and every value a type tag. Anything
/// other than a JSON object is rejected.
pub fn validate_schema(parts: &Value) -> Result<(), TesseraError> {
    parse_schema(parts).map(|_| ())
}

/// Validate and convert an untyped parts definition.
pub fn parse_schema(parts: &Value) -> Result<PartsSchema, TesseraError> {
    let Value::Object(map) = parts else {
        return Err(TesseraError::Schema(format!(
            "expected object for parts definition, found {}",
            json_kind(parts)
        )));
    };
    if map.len() > MAX_PARTS {
        return Err(TesseraError::Schema(format!(
            "{} parts exceeds maximum {}",
            map.len(),
            MAX_PARTS
        )));
    }

    let mut schema = PartsSchema::new();
    for (name, tag) in map {
        if !is_part_name(name) {
            return Err(TesseraError::Schema(format!(
                "expected a part name: {:?}",
                name
            )));
        }
        let tag = tag.as_str().and_then(TypeTag::parse).ok_or_else(|| {
            TesseraError::Schema(format!("expected a type for part `{}`: {}", name, tag))
        })?;
        schema.insert(name.clone(), tag);
    }
    Ok(schema)
}

// =============================================================================
// FILE INFO
// =============================================================================

/// Metadata for a raw file stored elsewhere in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileInfo {
    pub protocol_version: String,
    /// File extension or similar whitespace-free type token.
    pub file_type: String,
    /// Size in bytes, as a decimal-digit string.
    pub file_size: String,
    /// Address of the raw bytes.
    pub raw_data_cid: Cid,
}

impl FileInfo {
    /// Create a file info record.
    #[must_use]
    pub fn new(
        protocol_version: impl Into<String>,
        file_type: impl Into<String>,
        file_size: u64,
        raw_data_cid: Cid,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            file_type: file_type.into(),
            file_size: file_size.to_string(),
            raw_data_cid,
        }
    }

    /// File size as a number, if it fits in a `u64`.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.file_size.parse().ok()
    }

    /// Check field predicates.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if !is_file_type(&self.file_type) {
            return Err(TesseraError::format(
                Self::NAME,
                format!("invalid file type {:?}", self.file_type),
            ));
        }
        if !is_integer(&self.file_size) {
            return Err(TesseraError::format(
                Self::NAME,
                format!("invalid file size {:?}", self.file_size),
            ));
        }
        Ok(())
    }
}

impl Record for FileInfo {
    const NAME: &'static str = "FileInfo";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        let info: Self = canonical::decode_strict(Self::NAME, bytes)?;
        info.validate()?;
        Ok(info)
    }
}

// =============================================================================
// ENTITY DEFINITION
// =============================================================================

/// The schema entities of one type must satisfy.
///
/// Immutable once stored: the definition's address *is* the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub protocol_version: String,
    pub kind: EntityKind,
    /// Display name ("User Profile", "Short Post").
    pub name: String,
    pub parts: PartsSchema,
}

impl EntityDefinition {
    const FIELDS: [&'static str; 4] = ["protocol_version", "kind", "name", "parts"];

    /// Create a definition, validating part names.
    pub fn new(
        protocol_version: impl Into<String>,
        kind: EntityKind,
        name: impl Into<String>,
        parts: PartsSchema,
    ) -> Result<Self, TesseraError> {
        let definition = Self {
            protocol_version: protocol_version.into(),
            kind,
            name: name.into(),
            parts,
        };
        definition.validate()?;
        Ok(definition)
    }

    /// Check part names and part count.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if self.parts.len() > MAX_PARTS {
            return Err(TesseraError::Schema(format!(
                "{} parts exceeds maximum {}",
                self.parts.len(),
                MAX_PARTS
            )));
        }
        if let Some(bad) = self.parts.keys().find(|name| !is_part_name(name)) {
            return Err(TesseraError::Schema(format!(
                "expected a part name: {:?}",
                bad
            )));
        }
        Ok(())
    }
}

impl Record for EntityDefinition {
    const NAME: &'static str = "EntityDefinition";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        let object = canonical::parse_object(Self::NAME, bytes)?;
        canonical::expect_fields(Self::NAME, &object, &Self::FIELDS)?;

        let text = |field: &str| -> Result<String, TesseraError> {
            match object.get(field) {
                Some(Value::String(s)) => Ok(s.clone()),
                other => Err(TesseraError::Schema(format!(
                    "expected string for {}, found {}",
                    field,
                    other.map_or("nothing", json_kind)
                ))),
            }
        };

        let protocol_version = text("protocol_version")?;
        let name = text("name")?;
        let kind_text = text("kind")?;
        let kind = EntityKind::parse(&kind_text)
            .ok_or_else(|| TesseraError::Schema(format!("expected an entity kind: {:?}", kind_text)))?;
        let parts = parse_schema(object.get("parts").unwrap_or(&Value::Null))?;

        Ok(Self {
            protocol_version,
            kind,
            name,
            parts,
        })
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// One published record of a given entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entity {
    pub protocol_version: String,
    /// Address of the `EntityDefinition` this entity claims to satisfy.
    pub entity_type: Cid,
    /// Publisher-supplied timestamp (RFC 3339 by convention, not enforced).
    pub datetime: String,
    pub parts: PartValues,
}

impl Entity {
    /// Create an entity record. Conformance is checked by the validator.
    #[must_use]
    pub fn new(
        protocol_version: impl Into<String>,
        entity_type: Cid,
        datetime: impl Into<String>,
        parts: PartValues,
    ) -> Self {
        Self {
            protocol_version: protocol_version.into(),
            entity_type,
            datetime: datetime.into(),
            parts,
        }
    }
}

impl Record for Entity {
    const NAME: &'static str = "Entity";

    fn decode(bytes: &[u8]) -> Result<Self, TesseraError> {
        canonical::decode_strict(Self::NAME, bytes)
    }
}

// =============================================================================
// TESTS
// =============================================================================
