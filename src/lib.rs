//! Storage and query core of a structured full-text search engine
//! (spec.md §1 OVERVIEW): on-disk block layout, the transactional write
//! path, the posting-iterator join algebra, and metadata restriction
//! filtering, all laid over an externally supplied ordered KV store.
//!
//! Grounded on `examples/kev1N916-keSE`'s crate layout (one module per
//! concern, a thin facade crate root, `thiserror`-based error type,
//! `log`-based tracing) generalized from a query-time search engine to this
//! crate's storage-engine scope.

pub mod blocks;
pub mod client;
pub mod config;
pub mod dfcache;
pub mod error;
pub mod ids;
pub mod iter;
pub mod key;
pub mod kv;
pub mod maps;
pub mod restriction;
pub mod symtab;
pub mod txn;

pub use client::StorageClient;
pub use config::StoreConfig;
pub use error::{Result, StorageError};
