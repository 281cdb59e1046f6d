//! FRAM interface trait
//!
//! Ferroelectric RAM is byte-addressable, fast to write and needs no
//! erase cycle, but is tiny (~32 KiB). The storage engine keeps the
//! status table at the bottom of the address space and the flight-plan
//! TLB backup at the top.

use crate::platform::Result;

/// FRAM interface
pub trait FramInterface {
    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `addr`.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Device size in bytes.
    fn size(&self) -> u32;
}
