//! Resume capability for collection sessions
//!
//! A session's progress lives in one JSON checkpoint file per
//! (target, filter mode) pair. Files are written atomically under an
//! advisory lock and are never deleted automatically.

pub mod checkpoint;
pub mod store;

pub use checkpoint::{Checkpoint, CheckpointMetadata, SCHEMA_VERSION};
pub use store::{CheckpointEntry, CheckpointStore, SessionKey, MAX_CHECKPOINT_FILE_SIZE};

use thiserror::Error;

/// Checkpoint persistence errors
#[derive(Debug, Error)]
pub enum ResumeError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("Lock error: {0}")]
    LockError(String),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected version
        expected: String,
        /// Found version
        found: String,
    },

    /// Checkpoint file exceeds maximum allowed size
    #[error("Checkpoint file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// File belongs to a different session than the one requested
    #[error("Checkpoint belongs to {found}, expected {expected}")]
    SessionMismatch {
        /// Requested session
        expected: String,
        /// Session recorded in the file
        found: String,
    },

    /// Internally inconsistent checkpoint
    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),
}
