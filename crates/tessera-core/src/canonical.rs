//! # Canonical Encoding
//!
//! Every stored record has exactly one byte representation, because those
//! bytes decide its address.
//!
//! ## Encoding rules
//!
//! - Compact JSON, no insignificant whitespace
//! - Fields in struct declaration order (the order of the wire shapes)
//! - Maps are `BTreeMap`, so keys appear in ascending byte order
//! - Records are always serialized from typed structs, never from an
//!   untyped `serde_json::Value`
//!
//! ## Decoding rules
//!
//! - Objects over `MAX_RECORD_SIZE` are rejected before parsing
//! - The key set of every record (and nested record) must match exactly;
//!   extra or missing fields are format errors, not silently ignored

use crate::primitives::MAX_RECORD_SIZE;
use crate::store::ContentStore;
use crate::{Cid, TesseraError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A record type with one canonical wire shape.
pub trait Record: Serialize + Sized {
    /// Record name used in error messages.
    const NAME: &'static str;

    /// Parse and structurally validate canonical bytes.
    fn decode(bytes: &[u8]) -> Result<Self, TesseraError>;

    /// Canonical bytes of this record.
    fn encode(&self) -> Result<Vec<u8>, TesseraError> {
        encode(Self::NAME, self)
    }

    /// Address this record would have in a BLAKE3-addressed store.
    fn address(&self) -> Result<Cid, TesseraError> {
        Ok(Cid::digest(&self.encode()?))
    }

    /// Encode and put into `store`, returning the address.
    fn store<S: ContentStore + ?Sized>(&self, store: &mut S) -> Result<Cid, TesseraError> {
        let bytes = self.encode()?;
        let cid = store.put(&bytes)?;
        tracing::debug!(record = Self::NAME, %cid, size = bytes.len(), "stored record");
        Ok(cid)
    }

    /// Fetch from `store` and decode.
    fn load<S: ContentStore + ?Sized>(store: &S, cid: &Cid) -> Result<Self, TesseraError> {
        let bytes = store.get(cid)?;
        tracing::debug!(record = Self::NAME, %cid, size = bytes.len(), "loaded record");
        Self::decode(&bytes)
    }
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Serialize a typed record to canonical bytes.
pub fn encode<T: Serialize + ?Sized>(
    record: &'static str,
    value: &T,
) -> Result<Vec<u8>, TesseraError> {
    serde_json::to_vec(value).map_err(|e| TesseraError::format(record, e.to_string()))
}

/// Deserialize a typed record whose struct denies unknown fields.
///
/// Serde already rejects unknown and missing fields for such structs; this
/// adds the size guard and maps the error into the format taxonomy.
pub fn decode_strict<T: DeserializeOwned>(
    record: &'static str,
    bytes: &[u8],
) -> Result<T, TesseraError> {
    check_size(record, bytes)?;
    serde_json::from_slice(bytes).map_err(|e| TesseraError::format(record, e.to_string()))
}

/// Parse bytes into a JSON object without interpreting its fields.
pub fn parse_object(record: &'static str, bytes: &[u8]) -> Result<Map<String, Value>, TesseraError> {
    check_size(record, bytes)?;
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(TesseraError::format(
            record,
            format!("expected an object, found {}", json_kind(&other)),
        )),
        Err(e) => Err(TesseraError::format(record, e.to_string())),
    }
}

/// Require that `object` has exactly the `expected` keys.
pub fn expect_fields(
    record: &'static str,
    object: &Map<String, Value>,
    expected: &[&str],
) -> Result<(), TesseraError> {
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|k| !object.contains_key(*k))
        .collect();
    let mut extra: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|k| !expected.contains(k))
        .collect();
    extra.sort_unstable();

    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(TesseraError::format(
            record,
            format!("missing fields {:?}, unexpected fields {:?}", missing, extra),
        ))
    }
}

/// Human-readable name of a JSON value's type.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_size(record: &'static str, bytes: &[u8]) -> Result<(), TesseraError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(TesseraError::format(
            record,
            format!(
                "size {} bytes exceeds maximum allowed {} bytes",
                bytes.len(),
                MAX_RECORD_SIZE
            ),
        ));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
