//! Media abstraction layer
//!
//! The storage engine reaches its two non-volatile memories through the
//! traits in [`traits`]: a NOR flash organised in large erase sections
//! and page-bounded writes, and a small byte-addressable FRAM. Hardware
//! backends (SPI NOR + FRAM chips behind a vendor driver) implement the
//! same traits in the firmware crate; the [`mock`] backends run the
//! engine on a host against in-memory arrays.

pub mod error;
pub mod mock;
pub mod traits;

pub use error::{MediaError, Result};
