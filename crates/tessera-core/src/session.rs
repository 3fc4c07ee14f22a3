//! # Session Module
//!
//! A session combines a content store, the schema engine and the user root
//! into one handle for callers that do not want to thread a store through
//! every call.
//!
//! ## Storage Backends
//!
//! Session supports three storage backends:
//! - `InMemory`: Uses `MemoryStore` (fast, volatile)
//! - `Persistent`: Uses `RedbStore` for disk-backed ACID storage
//! - `External`: Any other `ContentStore`, such as an IPFS node client

use crate::cache::{CacheStats, LoadCache};
use crate::feed::Feed;
use crate::root::{FeedSettings, PublishOutcome, RootManager};
use crate::schema::{Entity, EntityDefinition, FileInfo};
use crate::spine::FeedEntry;
use crate::storage::RedbStore;
use crate::store::{ContentStore, MemoryStore};
use crate::validator::{Addressed, SchemaEngine};
use crate::{Cid, Record, TesseraError};
use std::path::Path;
use std::sync::Arc;

/// Default number of publish attempts before a root conflict is reported.
pub const DEFAULT_PUBLISH_ATTEMPTS: u32 = 3;

/// Storage backend for a Session.
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
    /// A store provided by the embedding application.
    External(Box<dyn ContentStore + Send + Sync>),
}

impl StorageBackend {
    /// Short name for status output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "memory",
            Self::Persistent(_) => "redb",
            Self::External(_) => "external",
        }
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory(store) => f.debug_tuple("InMemory").field(store).finish(),
            Self::Persistent(store) => f.debug_tuple("Persistent").field(store).finish(),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

impl ContentStore for StorageBackend {
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        match self {
            Self::InMemory(store) => store.put(bytes),
            Self::Persistent(store) => store.put(bytes),
            Self::External(store) => store.put(bytes),
        }
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        match self {
            Self::InMemory(store) => store.get(cid),
            Self::Persistent(store) => store.get(cid),
            Self::External(store) => store.get(cid),
        }
    }

    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError> {
        match self {
            Self::InMemory(store) => store.publish(cid),
            Self::Persistent(store) => store.publish(cid),
            Self::External(store) => store.publish(cid),
        }
    }

    fn resolve(&self) -> Result<Option<Cid>, TesseraError> {
        match self {
            Self::InMemory(store) => store.resolve(),
            Self::Persistent(store) => store.resolve(),
            Self::External(store) => store.resolve(),
        }
    }
}

/// Snapshot of a session for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub backend: &'static str,
    pub root: Option<Cid>,
    pub feeds: usize,
    /// Entries across all feeds.
    pub entries: u64,
    pub cache: CacheStats,
}

/// A session over one user's root.
#[derive(Debug)]
pub struct Session {
    backend: StorageBackend,
    root: RootManager,
    max_attempts: u32,
}

impl Session {
    /// Open a session over `backend`, loading or initializing its root.
    pub fn open(backend: StorageBackend, settings: FeedSettings) -> Result<Self, TesseraError> {
        let mut backend = backend;
        let engine = SchemaEngine::new(Arc::new(LoadCache::new()));
        let root = RootManager::load(&mut backend, engine, settings)?;
        tracing::debug!(backend = backend.name(), root = ?root.base(), "session opened");
        Ok(Self {
            backend,
            root,
            max_attempts: DEFAULT_PUBLISH_ATTEMPTS,
        })
    }

    /// Create a session with volatile in-memory storage.
    pub fn in_memory(settings: FeedSettings) -> Result<Self, TesseraError> {
        Self::open(StorageBackend::default(), settings)
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>, settings: FeedSettings) -> Result<Self, TesseraError> {
        Self::open(StorageBackend::Persistent(RedbStore::open(path)?), settings)
    }

    /// Create a session over an application-provided store.
    pub fn with_store(
        store: Box<dyn ContentStore + Send + Sync>,
        settings: FeedSettings,
    ) -> Result<Self, TesseraError> {
        Self::open(StorageBackend::External(store), settings)
    }

    /// Set how many times a publish is attempted when the root moves.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Check if this session uses persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    #[must_use]
    pub fn settings(&self) -> &FeedSettings {
        self.root.settings()
    }

    fn engine(&self) -> &SchemaEngine {
        self.root.engine()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Store raw bytes (file payloads) and return their address.
    pub fn put_raw(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        self.backend.put(bytes)
    }

    /// Validate and store an entity definition. Its address is the entity type.
    pub fn define(&mut self, definition: &EntityDefinition) -> Result<Cid, TesseraError> {
        definition.validate()?;
        let cid = definition.store(&mut self.backend)?;
        tracing::info!(entity_type = %cid, name = %definition.name, kind = %definition.kind, "defined entity type");
        Ok(cid)
    }

    /// Validate and store a file info record.
    pub fn store_file_info(&mut self, info: &FileInfo) -> Result<Cid, TesseraError> {
        info.validate()?;
        info.store(&mut self.backend)
    }

    /// Validate, store and append an entity, publishing the new root.
    pub fn publish_entity(&mut self, entity: Entity) -> Result<PublishOutcome, TesseraError> {
        self.root
            .publish_entity_with_retry(&mut self.backend, entity, self.max_attempts)
    }

    /// Re-read the published root, discarding the in-memory view.
    pub fn reload(&mut self) -> Result<(), TesseraError> {
        let engine = self.engine().clone();
        let settings = self.settings().clone();
        self.root = RootManager::load(&mut self.backend, engine, settings)?;
        Ok(())
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Check an entity against its declared definition without storing it.
    pub fn check_entity(&self, entity: &Entity) -> Result<(), TesseraError> {
        let definition = self.load_definition(&entity.entity_type)?;
        self.engine()
            .check_entity(&self.backend, &definition, entity)
    }

    pub fn load_definition(&self, cid: &Cid) -> Result<Addressed<EntityDefinition>, TesseraError> {
        self.engine().load_definition(&self.backend, cid)
    }

    pub fn load_file_info(&self, cid: &Cid) -> Result<Addressed<FileInfo>, TesseraError> {
        self.engine().load_file_info(&self.backend, cid)
    }

    pub fn load_entity(&self, cid: &Cid) -> Result<Addressed<Entity>, TesseraError> {
        self.engine().load_entity(&self.backend, cid)
    }

    /// Current feed for an entity type.
    #[must_use]
    pub fn feed(&self, entity_type: &Cid) -> Option<Arc<Feed>> {
        self.root.feed(entity_type).cloned()
    }

    /// Entity types that have a feed.
    #[must_use]
    pub fn entity_types(&self) -> Vec<Cid> {
        self.root.feeds().keys().cloned().collect()
    }

    /// Item at `sequence_number` in the feed for `entity_type`.
    pub fn lookup(&self, entity_type: &Cid, sequence_number: u64) -> Result<Option<Cid>, TesseraError> {
        match self.root.feed(entity_type) {
            Some(feed) => feed.get(&self.backend, sequence_number),
            None => Ok(None),
        }
    }

    /// Full history of a feed, newest first. Empty if there is no feed.
    pub fn history(&self, entity_type: &Cid) -> Result<Vec<FeedEntry>, TesseraError> {
        match self.root.feed(entity_type) {
            Some(feed) => feed.history(&self.backend),
            None => Ok(Vec::new()),
        }
    }

    /// Raw bytes behind an address.
    pub fn raw(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        self.backend.get(cid)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            backend: self.backend.name(),
            root: self.root.base().cloned(),
            feeds: self.root.feeds().len(),
            entries: self.root.feeds().values().map(|feed| feed.len()).sum(),
            cache: self.engine().cache().stats(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
