//! NOR flash interface trait
//!
//! Backends provide flat byte-offset access to one or more flash
//! partitions. Flash is used for flight-plan records, payload sample
//! buffers and (optionally) the flight-plan TLB backup.
//!
//! # Flash Characteristics
//!
//! - Organised in large erase sections (typically 256 KiB)
//! - Erase sets every byte of a section to 0xFF
//! - Writes can only clear bits (1 -> 0) and must not cross a page
//!   boundary (typically 512 bytes); parts such as the S25FL512S wrap a
//!   straddling write back to the start of the page instead of advancing
//! - Erasing a section is slow (on the order of 500 ms) and blocks the
//!   calling thread

use crate::platform::Result;

/// NOR flash interface
///
/// `addr` is always a flat byte offset from the start of the partition.
pub trait FlashInterface {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, partition: u8, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `addr`.
    ///
    /// The target region must be in the erased state and the write must
    /// lie entirely within one page. Implementations reject straddling
    /// writes with [`MediaError::PageOverflow`](crate::platform::MediaError).
    fn write(&mut self, partition: u8, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase the whole section containing `addr` back to 0xFF.
    fn erase_section(&mut self, partition: u8, addr: u32) -> Result<()>;

    /// Write-boundary unit in bytes.
    fn page_size(&self) -> u32;

    /// Erase unit in bytes.
    fn section_size(&self) -> u32;

    /// Total capacity of one partition in bytes.
    fn capacity(&self) -> u32;
}
