//! Storage error types
//!
//! Every engine operation returns `Result<T, StorageError>`; leaf errors
//! bubble unchanged and the repository façade logs them. Derived
//! counters advance only when the operation succeeded.

use crate::platform::MediaError;
use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = core::result::Result<T, StorageError>;

/// Errors from the storage engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Operation issued before open or after close
    #[error("storage is not open")]
    NotOpen,
    /// The table has not been initialized
    #[error("table not initialized")]
    NotInitialized,
    /// The table is already initialized and `drop` was not requested
    #[error("table already initialized")]
    AlreadyInitialized,
    /// Index, payload id or argument out of range
    #[error("index or argument out of bounds")]
    Bounds,
    /// The access would straddle a flash page boundary
    #[error("access crosses a page boundary")]
    Alignment,
    /// No free flight-plan slot and compaction cannot reclaim any
    #[error("flight plan has no space for another command")]
    Full,
    /// No entry matches the requested time or index
    #[error("no matching entry")]
    NotFound,
    /// The configuration does not describe a usable partition plan
    #[error("invalid storage configuration: {0}")]
    Config(&'static str),
    /// The underlying medium reported a failure
    #[error(transparent)]
    Media(#[from] MediaError),
}
