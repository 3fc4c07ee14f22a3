//! # redb-backed Content Store
//!
//! A disk-backed content store using the redb embedded database.
//!
//! - `objects`: address -> canonical bytes, written once per address
//! - `metadata`: `"root"` -> the root pointer record (see `formats`)
//!
//! Every put and publish is its own ACID transaction, so a crash never
//! leaves a published root pointing at an unwritten object.

use crate::formats::{RootPointer, pointer_from_bytes, pointer_to_bytes};
use crate::store::ContentStore;
use crate::{Cid, TesseraError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for objects: address -> canonical bytes
const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");

/// Table for metadata: key string -> encoded record
const METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Metadata key of the root pointer.
const ROOT_KEY: &str = "root";

fn store_error(e: impl std::fmt::Display) -> TesseraError {
    TesseraError::Store(e.to_string())
}

/// A disk-backed content store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TesseraError> {
        let db = Database::create(path.as_ref()).map_err(store_error)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(store_error)?;
            let _ = write_txn.open_table(OBJECTS).map_err(store_error)?;
            let _ = write_txn.open_table(METADATA).map_err(store_error)?;
            write_txn.commit().map_err(store_error)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "opened redb store");
        Ok(Self { db })
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> Result<usize, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(OBJECTS).map_err(store_error)?;
        let count = table.len().map_err(store_error)?;
        usize::try_from(count).map_err(store_error)
    }

    /// The full root pointer, including its publish generation.
    pub fn pointer(&self) -> Result<RootPointer, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(METADATA).map_err(store_error)?;
        match table.get(ROOT_KEY).map_err(store_error)? {
            Some(bytes) => pointer_from_bytes(bytes.value()),
            None => Ok(RootPointer::default()),
        }
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), TesseraError> {
        self.db.compact().map_err(store_error)?;
        Ok(())
    }
}

impl ContentStore for RedbStore {
    fn put(&mut self, bytes: &[u8]) -> Result<Cid, TesseraError> {
        let cid = Cid::digest(bytes);
        let write_txn = self.db.begin_write().map_err(store_error)?;
        {
            let mut table = write_txn.open_table(OBJECTS).map_err(store_error)?;
            let present = table.get(cid.as_str()).map_err(store_error)?.is_some();
            if !present {
                table.insert(cid.as_str(), bytes).map_err(store_error)?;
            }
        }
        write_txn.commit().map_err(store_error)?;
        Ok(cid)
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, TesseraError> {
        let read_txn = self.db.begin_read().map_err(store_error)?;
        let table = read_txn.open_table(OBJECTS).map_err(store_error)?;
        table
            .get(cid.as_str())
            .map_err(store_error)?
            .map(|v| v.value().to_vec())
            .ok_or_else(|| TesseraError::MissingObject(cid.clone()))
    }

    fn publish(&mut self, cid: &Cid) -> Result<(), TesseraError> {
        let write_txn = self.db.begin_write().map_err(store_error)?;
        let generation = {
            let mut table = write_txn.open_table(METADATA).map_err(store_error)?;
            let current = match table.get(ROOT_KEY).map_err(store_error)? {
                Some(bytes) => pointer_from_bytes(bytes.value())?,
                None => RootPointer::default(),
            };
            let next = current.advance(cid.clone());
            let encoded = pointer_to_bytes(&next)?;
            table
                .insert(ROOT_KEY, encoded.as_slice())
                .map_err(store_error)?;
            next.generation
        };
        write_txn.commit().map_err(store_error)?;
        tracing::debug!(root = %cid, generation, "root pointer updated");
        Ok(())
    }

    fn resolve(&self) -> Result<Option<Cid>, TesseraError> {
        Ok(self.pointer()?.root)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_roundtrip() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let a = store.put(b"{\"a\":1}").unwrap();
        let again = store.put(b"{\"a\":1}").unwrap();

        assert_eq!(a, again);
        assert_eq!(a, Cid::digest(b"{\"a\":1}"));
        assert_eq!(store.get(&a).unwrap(), b"{\"a\":1}");
        assert_eq!(store.object_count().unwrap(), 1);
    }

    #[test]
    fn missing_object() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let cid = Cid::digest(b"nothing");

        assert_eq!(store.get(&cid), Err(TesseraError::MissingObject(cid.clone())));
    }

    #[test]
    fn publish_advances_generation() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        assert_eq!(store.resolve().unwrap(), None);

        let first = store.put(b"1").unwrap();
        let second = store.put(b"2").unwrap();
        store.publish(&first).unwrap();
        store.publish(&second).unwrap();

        let pointer = store.pointer().unwrap();
        assert_eq!(pointer.root, Some(second));
        assert_eq!(pointer.generation, 2);
    }

    #[test]
    fn persists_across_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");

        let cid = {
            let mut store = RedbStore::open(&path).expect("open db");
            let cid = store.put(b"persisted").unwrap();
            store.publish(&cid).unwrap();
            cid
        };

        let store = RedbStore::open(&path).expect("reopen db");
        assert_eq!(store.resolve().unwrap(), Some(cid.clone()));
        assert_eq!(store.get(&cid).unwrap(), b"persisted");
    }
}
