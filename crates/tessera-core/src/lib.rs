//! # tessera-core
//!
//! The durable-log core of Tessera - THE LOGIC.
//!
//! This crate stores typed entities as immutable records in a
//! content-addressed store, checks them against versioned schemas, and keeps
//! each entity type's history in an append-only feed whose recent window is
//! bounded and whose older history lives in a logarithmic spine.
//!
//! ## Layers
//!
//! - `types`, `canonical`: addresses, error taxonomy, the one wire encoding
//! - `schema`, `validator`, `cache`: record shapes and the entity checker
//! - `spine`, `feed`: history storage
//! - `root`: the published per-user aggregate of feeds
//! - `store`, `storage`, `session`: backends and the façade over them
//!
//! ## Architectural Constraints
//!
//! - Records are never modified in place; every update builds a new value
//! - Validation never writes; a rejected entity leaves the store untouched
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod canonical;
pub mod feed;
pub mod formats;
pub mod primitives;
pub mod root;
pub mod schema;
pub mod session;
pub mod spine;
pub mod storage;
pub mod store;
pub mod types;
pub mod validator;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Cid, EntityKind, PartValue, TesseraError, TypeTag};

// =============================================================================
// RE-EXPORTS: Records and Engine
// =============================================================================

pub use cache::{CacheStats, LoadCache};
pub use canonical::Record;
pub use feed::Feed;
pub use root::{FeedSettings, PublishOutcome, RootManager, UserRoot};
pub use schema::{
    Entity, EntityDefinition, FileInfo, PartValues, PartsSchema, is_valid_type_tag,
    validate_schema,
};
pub use spine::{FeedEntry, SearchSpineStack, SearchSpineTree, SpineFirst, SpineLevel};
pub use validator::{Addressed, SchemaEngine};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use formats::{PersistenceHeader, RootPointer};
pub use session::{Session, SessionStatus, StorageBackend};
pub use storage::RedbStore;
pub use store::{ContentStore, MemoryStore, StoreCounters};
