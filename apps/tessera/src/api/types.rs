//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Record bodies (`POST /definitions`, `/file-infos`, `/entities`) are not
//! listed here: they are the wire records themselves and are decoded with
//! the same exact-field-set rules as records read from the store.

use serde::{Deserialize, Serialize};
use tessera_core::{Cid, Entity, Feed, FeedEntry, PublishOutcome, SessionStatus};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Session status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub backend: String,
    pub root: Option<String>,
    pub feed_count: usize,
    pub entry_count: u64,
    pub cache: CacheJson,
}

/// Load cache entry counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheJson {
    pub definitions: usize,
    pub file_infos: usize,
    pub entities: usize,
    pub feeds: usize,
}

impl From<&SessionStatus> for StatusResponse {
    fn from(status: &SessionStatus) -> Self {
        Self {
            backend: status.backend.to_string(),
            root: status.root.as_ref().map(|cid| cid.to_string()),
            feed_count: status.feeds,
            entry_count: status.entries,
            cache: CacheJson {
                definitions: status.cache.definitions,
                file_infos: status.cache.file_infos,
                entities: status.cache.entities,
                feeds: status.cache.feeds,
            },
        }
    }
}

// =============================================================================
// STORE RESPONSE
// =============================================================================

/// Response to storing a definition or file info.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    pub cid: Option<String>,
    pub error: Option<String>,
}

impl StoreResponse {
    pub fn success(cid: &Cid) -> Self {
        Self {
            success: true,
            cid: Some(cid.to_string()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            cid: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// CHECK RESPONSE
// =============================================================================

/// Result of checking an entity without publishing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub valid: bool,
    pub error: Option<String>,
}

impl CheckResponse {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// PUBLISH RESPONSE
// =============================================================================

/// Result of publishing an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub success: bool,
    pub entity: Option<String>,
    pub root: Option<String>,
    pub sequence_number: Option<u64>,
    pub error: Option<String>,
}

impl PublishResponse {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            entity: None,
            root: None,
            sequence_number: None,
            error: Some(msg.into()),
        }
    }
}

impl From<&PublishOutcome> for PublishResponse {
    fn from(outcome: &PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Published {
                entity,
                root,
                sequence_number,
            } => Self {
                success: true,
                entity: Some(entity.to_string()),
                root: Some(root.to_string()),
                sequence_number: Some(*sequence_number),
                error: None,
            },
            PublishOutcome::Rejected(e) => Self::error(e.to_string()),
        }
    }
}

// =============================================================================
// FEED RESPONSES
// =============================================================================

/// One line of `GET /feeds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSummary {
    pub entity_type: String,
    pub next_sequence_number: u64,
    pub recent_count: usize,
    pub evicted_count: u64,
    pub latest: Option<String>,
}

impl FeedSummary {
    pub fn new(entity_type: &Cid, feed: &Feed) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            next_sequence_number: feed.next_sequence_number,
            recent_count: feed.recent.len(),
            evicted_count: feed.evicted_count(),
            latest: feed.latest().map(|entry| entry.item.to_string()),
        }
    }
}

/// Response listing every feed in the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsResponse {
    pub feeds: Vec<FeedSummary>,
}

/// Query string for `GET /feeds/{entity_type}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedQuery {
    /// Walk the spine for the full history instead of the recent window.
    #[serde(default)]
    pub all: bool,
}

/// Feed entry JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryJson {
    pub sequence_number: u64,
    pub item: String,
}

impl From<&FeedEntry> for EntryJson {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            sequence_number: entry.sequence_number,
            item: entry.item.to_string(),
        }
    }
}

/// Entries of one feed, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub entity_type: String,
    pub next_sequence_number: u64,
    pub optimal_recent: u64,
    /// True when `entries` is the full history rather than the recent window.
    pub complete: bool,
    pub entries: Vec<EntryJson>,
}

/// One entry looked up by sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub found: bool,
    pub entity_type: String,
    pub sequence_number: u64,
    pub item: Option<String>,
    /// The entity record itself, when the item resolves to one.
    pub entity: Option<Entity>,
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Error body for endpoints whose success shape has no error field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
