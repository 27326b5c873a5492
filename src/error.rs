//! Error taxonomy for the storage core (spec §7).
//!
//! `NotFound` is deliberately absent: lookups return `Option`/id-0 sentinels
//! at the read API rather than raising an error (see SPEC_FULL.md D.3).

use thiserror::Error;

/// The error kinds raised by the storage core.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("incomplete definition: {0}")]
    IncompleteDefinition(String),

    #[error("integrity error at key {key:?}: {detail}")]
    IntegrityError { key: Vec<u8>, detail: String },

    #[error("store I/O error: {0}")]
    StoreIOError(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("operator not implemented: {0}")]
    NotImplemented(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn integrity(key: &[u8], detail: impl Into<String>) -> Self {
        StorageError::IntegrityError {
            key: key.to_vec(),
            detail: detail.into(),
        }
    }
}
