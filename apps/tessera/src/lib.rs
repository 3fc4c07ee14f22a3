//! # tessera
//!
//! The Tessera application: CLI, configuration, HTTP API and the IPFS-backed
//! content store. All record logic lives in `tessera-core`.

pub mod api;
pub mod cli;
pub mod config;
pub mod ipfs;
