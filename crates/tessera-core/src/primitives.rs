//! # Protocol Primitives
//!
//! Hardcoded constants for the Tessera core.
//!
//! These values are part of the wire protocol or of the store-facing safety
//! limits, and are fixed at compile time.

/// Protocol version written into new records by default.
pub const PROTOCOL_VERSION: &str = "v0";

/// Default size of a feed's recent window.
///
/// A feed holds between `k` and `2k - 1` recent entries; reaching `2k`
/// evicts the oldest `k` into the spine.
pub const DEFAULT_OPTIMAL_RECENT: u64 = 20;

/// Upper bound accepted for `optimal_recent`.
///
/// A recent window is rewritten on every append, so it must stay small.
pub const MAX_OPTIMAL_RECENT: u64 = 4096;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a single stored record.
///
/// Objects larger than this (16 MB) are rejected before JSON parsing.
/// Raw file payloads are referenced by address and never parsed here.
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Maximum length of a part name.
pub const MAX_PART_NAME_LENGTH: usize = 128;

/// Maximum number of parts in one definition.
pub const MAX_PARTS: usize = 256;

// =============================================================================
// ROOT POINTER FORMAT
// =============================================================================

/// Magic bytes for the persisted root pointer record ("Tessera Root Pointer").
pub const POINTER_MAGIC: &[u8; 4] = b"TSRP";

/// Current root pointer format version.
///
/// Increment this when making breaking changes to the pointer record.
pub const POINTER_FORMAT_VERSION: u8 = 1;
