//! # Persistence Format
//!
//! Binary serialization for the published root pointer.
//!
//! Stored objects themselves are canonical JSON and need no envelope; the
//! root pointer is the one piece of mutable state a persistent store keeps,
//! so it gets a versioned binary record.
//!
//! Format: Header (5 bytes) + postcard-serialized pointer.
//! - 4 bytes: Magic ("TSRP")
//! - 1 byte: Version
//!
//! Header and size are validated before the payload is parsed.

use crate::{Cid, TesseraError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum allowed size of an encoded pointer.
///
/// A pointer is one address and a counter; anything larger is corrupt.
pub const MAX_POINTER_SIZE: usize = 4 * 1024;

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

/// The persistence header precedes the pointer payload.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::POINTER_MAGIC,
            version: primitives::POINTER_FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), TesseraError> {
        if &self.magic != primitives::POINTER_MAGIC {
            return Err(TesseraError::Store(
                "Invalid root pointer magic bytes".to_string(),
            ));
        }
        if self.version != primitives::POINTER_FORMAT_VERSION {
            return Err(TesseraError::Store(format!(
                "Unsupported root pointer version: {} (expected {})",
                self.version,
                primitives::POINTER_FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TesseraError> {
        if bytes.len() < HEADER_SIZE {
            return Err(TesseraError::Store(
                "Root pointer header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ROOT POINTER
// =============================================================================

/// The published root of a persistent store.
///
/// `generation` counts publishes, so two pointers to the same root taken
/// at different times are still distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootPointer {
    pub root: Option<Cid>,
    pub generation: u64,
}

impl RootPointer {
    /// The pointer after publishing `cid`.
    #[must_use]
    pub fn advance(&self, cid: Cid) -> Self {
        Self {
            root: Some(cid),
            generation: self.generation.saturating_add(1),
        }
    }
}

/// Wire form of the pointer. Addresses travel as plain strings so the
/// binary layout does not depend on `Cid`'s serde representation.
#[derive(Serialize, Deserialize)]
struct PointerPayload {
    root: Option<String>,
    generation: u64,
}

/// Serialize a root pointer to bytes (header + payload).
pub fn pointer_to_bytes(pointer: &RootPointer) -> Result<Vec<u8>, TesseraError> {
    let header = PersistenceHeader::new();
    let payload = PointerPayload {
        root: pointer.root.as_ref().map(|cid| cid.as_str().to_string()),
        generation: pointer.generation,
    };

    let payload =
        postcard::to_stdvec(&payload).map_err(|e| TesseraError::Store(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a root pointer from bytes.
pub fn pointer_from_bytes(bytes: &[u8]) -> Result<RootPointer, TesseraError> {
    if bytes.len() > MAX_POINTER_SIZE {
        return Err(TesseraError::Store(format!(
            "Root pointer size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_POINTER_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload: PointerPayload = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        TesseraError::Store(format!("Failed to deserialize root pointer: {}", e))
    })?;

    let root = payload
        .root
        .map(Cid::parse)
        .transpose()
        .map_err(|e| TesseraError::Store(format!("Corrupt root pointer: {}", e)))?;

    Ok(RootPointer {
        root,
        generation: payload.generation,
    })
}

// =============================================================================
// TESTS
// =============================================================================
