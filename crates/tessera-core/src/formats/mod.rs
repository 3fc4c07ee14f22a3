//! # Formats
//!
//! Binary formats for state that lives outside the content-addressed store.

pub mod persistence;

pub use persistence::{
    MAX_POINTER_SIZE, PersistenceHeader, RootPointer, pointer_from_bytes, pointer_to_bytes,
};
