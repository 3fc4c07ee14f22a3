//! # Content Store
//!
//! The boundary between the core and whatever actually holds the bytes.
//!
//! This module defines the `ContentStore` trait and an in-memory
//! implementation. Persistent and external backends live in `storage` and in
//! the binary crate.

use crate::{Cid, TesseraError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// CONTENTSTORE TRAIT
// =============================================================================

/// A put/get/publish/resolve backend keyed by content.
///
/// Implementations must guarantee that `put` of identical bytes returns the
/// identical address, and that the bytes behind an address never change.
/// A missing address is an error (`TesseraError::MissingObject`), never an
/// empty result. Retries and timeouts are the implementation's concern.
pub trait ContentStore {
    /// Store `bytes` and return their address.
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError>;

    /// Fetch the bytes previously stored under `cid`.
    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError>;

    /// Point the caller's mutable root at `cid`.
    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError>;

    /// The caller's current root, or `None` before the first publish.
    fn resolve(&self) -> Result<Option<Cid>, TesseraError>;
}

impl<S: ContentStore + ?Sized> ContentStore for Box<S> {
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        (**self).put(bytes)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        (**self).get(cid)
    }

    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError> {
        (**self).publish(cid)
    }

    fn resolve(&self) -> Result<Option<Cid>, TesseraError> {
        (**self).resolve()
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Call counters for a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub puts: u64,
    pub gets: u64,
    pub publishes: u64,
    pub resolves: u64,
}

/// An in-memory content store.
///
/// Uses `BTreeMap` for deterministic iteration. Every call is counted so
/// tests can assert how often the core actually reaches the backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Stored objects: address -> canonical bytes.
    objects: BTreeMap<Cid, Vec<u8>>,
    /// The published root pointer.
    root: Option<Cid>,
    puts: AtomicU64,
    gets: AtomicU64,
    publishes: AtomicU64,
    resolves: AtomicU64,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects stored.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Check whether an address is present.
    #[must_use]
    pub fn contains(&self, cid: &Cid) -> bool {
        self.objects.contains_key(cid)
    }

    /// Iterate addresses in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = &Cid> {
        self.objects.keys()
    }

    /// Snapshot of the call counters.
    #[must_use]
    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            resolves: self.resolves.load(Ordering::Relaxed),
        }
    }
}

impl ContentStore for MemoryStore {
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        let cid = Cid::digest(bytes);
        self.objects
            .entry(cid.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.objects
            .get(cid)
            .cloned()
            .ok_or_else(|| TesseraError::MissingObject(cid.clone()))
    }

    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError> {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        self.root = Some(cid.clone());
        Ok(())
    }

    fn resolve(&self) -> Result<Option<Cid>, TesseraError> {
        self.resolves.fetch_add(1, Ordering::Relaxed);
        Ok(self.root.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
