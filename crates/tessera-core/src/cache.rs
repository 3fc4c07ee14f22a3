//! # Load Caches
//!
//! Address-keyed caches for decoded records.
//!
//! An address never changes its referent, so entries are never invalidated
//! and a cache can be shared freely between readers. Two writers racing on
//! the same address insert equal values; the later insert wins.

use crate::feed::Feed;
use crate::schema::{Entity, EntityDefinition, FileInfo};
use crate::Cid;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A cache for one record type.
#[derive(Debug)]
pub struct RecordCache<T> {
    entries: RwLock<BTreeMap<Cid, Arc<T>>>,
}

impl<T> Default for RecordCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> RecordCache<T> {
    /// Look up a decoded record.
    #[must_use]
    pub fn get(&self, cid: &Cid) -> Option<Arc<T>> {
        // A poisoned lock still holds consistent data: inserts are atomic.
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.get(cid).cloned()
    }

    /// Insert a decoded record, returning the shared handle.
    pub fn insert(&self, cid: Cid, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(cid, Arc::clone(&value));
        value
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Entry counts per cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub definitions: usize,
    pub file_infos: usize,
    pub entities: usize,
    pub feeds: usize,
}

/// All load caches used by the schema engine.
///
/// Owned explicitly and injected, so tests get a fresh cache per run.
#[derive(Debug, Default)]
pub struct LoadCache {
    pub definitions: RecordCache<EntityDefinition>,
    pub file_infos: RecordCache<FileInfo>,
    pub entities: RecordCache<Entity>,
    pub feeds: RecordCache<Feed>,
}

impl LoadCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            definitions: self.definitions.len(),
            file_infos: self.file_infos.len(),
            entities: self.entities.len(),
            feeds: self.feeds.len(),
        }
    }
}
