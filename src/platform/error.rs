//! Media error types
//!
//! All backends map their driver-specific failures to these variants.
//! Errors are fatal at the operation level: a failed read, write or erase
//! reports no partial completion.

use thiserror::Error;

/// Result type for media operations
pub type Result<T> = core::result::Result<T, MediaError>;

/// Errors from flash and FRAM accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Address or length falls outside the device
    #[error("address out of device range")]
    InvalidAddress,
    /// Unknown flash partition
    #[error("invalid flash partition")]
    InvalidPartition,
    /// A write would cross a page boundary
    #[error("write crosses a page boundary")]
    PageOverflow,
    /// Erase address is not section-aligned
    #[error("erase address not section aligned")]
    UnalignedErase,
    /// The underlying transfer failed
    #[error("media transfer failed")]
    TransferFailed,
}
