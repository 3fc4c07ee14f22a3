//! # Storage Backends
//!
//! Persistent `ContentStore` implementations.

pub mod redb_store;

pub use redb_store::RedbStore;
