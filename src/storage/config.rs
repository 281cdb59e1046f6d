//! Storage configuration
//!
//! All geometry and sizing that the original firmware fixed with
//! compile-time macros is carried here as one value, validated at
//! [`Storage::open`](crate::storage::Storage::open). Tests shrink the
//! section size to a few pages to exercise compaction cheaply.

use crate::storage::error::{Result, StorageError};
use crate::storage::flight_plan::{FP_ENTRY_SIZE, TLB_SLOT_SIZE};

/// Where the flight-plan TLB backup lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlbLocation {
    /// Top of the FRAM (fast rewrite, no erase cycle)
    #[default]
    Fram,
    /// A dedicated flash section (erase-rewrite on every dump)
    Flash,
}

/// Storage engine configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Flash write-boundary unit in bytes
    pub page_size: u32,
    /// Flash erase unit in bytes
    pub section_size: u32,
    /// FRAM device size in bytes
    pub fram_size: u32,
    /// Base flash byte address of the storage partition plan
    pub flash_init: u32,
    /// Flash partition used by the engine
    pub flash_partition: u8,
    /// Flight-plan TLB capacity (logical entries)
    pub fp_max_entries: usize,
    /// Flash sections reserved per payload
    pub sections_per_payload: usize,
    /// Maximum number of payloads
    pub max_payloads: usize,
    /// Flight-plan TLB backup location
    pub tlb_location: TlbLocation,
    /// Triple-write the status table and vote on read
    pub triple_writing: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: 512,
            section_size: 256 * 1024,
            fram_size: 32 * 1024,
            flash_init: 0,
            flash_partition: 0,
            fp_max_entries: 100,
            sections_per_payload: 8,
            max_payloads: 8,
            tlb_location: TlbLocation::Fram,
            triple_writing: true,
        }
    }
}

impl StorageConfig {
    /// Flight-plan entries that fit one flash section.
    pub fn commands_per_section(&self) -> usize {
        (self.section_size as usize) / FP_ENTRY_SIZE
    }

    /// Flash sections reserved for flight-plan records.
    pub fn fp_sections(&self) -> usize {
        (self.fp_max_entries * FP_ENTRY_SIZE) / self.section_size as usize + 1
    }

    /// Size of the serialized TLB, metadata slot included.
    pub fn tlb_bytes(&self) -> usize {
        (self.fp_max_entries + 1) * TLB_SLOT_SIZE
    }

    /// FRAM address of the TLB backup (top of the device).
    pub fn tlb_fram_addr(&self) -> u32 {
        self.fram_size - self.tlb_bytes() as u32
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.section_size % self.page_size != 0 {
            return Err(StorageError::Config(
                "section size must be a multiple of the page size",
            ));
        }
        // Flight-plan records occupy exactly one page so a record write
        // can never straddle a page boundary.
        if self.page_size as usize != FP_ENTRY_SIZE {
            return Err(StorageError::Config(
                "page size must equal the flight plan entry size",
            ));
        }
        // TLB slot boundaries must coincide with page boundaries when the
        // backup is dumped to flash in page-sized chunks.
        if self.page_size as usize % TLB_SLOT_SIZE != 0 {
            return Err(StorageError::Config(
                "page size must be a multiple of the TLB slot size",
            ));
        }
        if self.fp_max_entries == 0 {
            return Err(StorageError::Config("flight plan capacity is zero"));
        }
        if self.tlb_bytes() as u32 >= self.fram_size {
            return Err(StorageError::Config("TLB backup does not fit the FRAM"));
        }
        if self.sections_per_payload == 0 || self.max_payloads == 0 {
            return Err(StorageError::Config("payload plan is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        StorageConfig::default().validate().unwrap();
    }

    #[test]
    fn default_geometry() {
        let cfg = StorageConfig::default();
        assert_eq!(cfg.commands_per_section(), 512);
        assert_eq!(cfg.fp_sections(), 1);
        assert_eq!(cfg.tlb_bytes(), 808);
        assert_eq!(cfg.tlb_fram_addr(), 32 * 1024 - 808);
    }

    #[test]
    fn unaligned_section_rejected() {
        let cfg = StorageConfig {
            section_size: 1000,
            ..StorageConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(StorageError::Config(_))));
    }

    #[test]
    fn oversized_tlb_rejected() {
        let cfg = StorageConfig {
            fp_max_entries: 8192,
            ..StorageConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(StorageError::Config(_))));
    }
}
