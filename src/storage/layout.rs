//! Static partition plan
//!
//! Computed once at open time from the configuration:
//!
//! ```text
//!                    FLASH
//!  Section |        Usage              | Addr (defaults)
//!  --------+---------------------------+------------------
//!      0   |  FP TLB backup (flash     | flash_init
//!          |  location only)           |
//!   1..=F  |  Flight-plan records,     | flash_init + SECTION
//!          |  512-byte slots, dense    |
//!   F+1..  |  Payload buffers, K       | fp_base + F * SECTION
//!          |  sections per payload     |
//! ```
//!
//! The FRAM holds the status table at address 0 and, when configured,
//! the TLB backup at the top of the device.

use crate::storage::config::StorageConfig;

/// Resolved flash addresses of the partition plan.
#[derive(Debug, Clone)]
pub(crate) struct AddressMap {
    /// Base of the TLB backup section (unused in FRAM mode)
    pub tlb_base: u32,
    /// Base of the first flight-plan section
    pub fp_base: u32,
    /// Number of flight-plan sections
    pub fp_sections: usize,
    /// Base of the first payload section
    pub payload_base: u32,
    section_size: u32,
}

impl AddressMap {
    pub fn new(cfg: &StorageConfig) -> Self {
        let tlb_base = cfg.flash_init;
        let fp_base = tlb_base + cfg.section_size;
        let fp_sections = cfg.fp_sections();
        let payload_base = fp_base + fp_sections as u32 * cfg.section_size;
        Self {
            tlb_base,
            fp_base,
            fp_sections,
            payload_base,
            section_size: cfg.section_size,
        }
    }

    /// Base address of flight-plan section `i`.
    pub fn fp_section_addr(&self, i: usize) -> u32 {
        self.fp_base + i as u32 * self.section_size
    }

    /// Base address of payload section `i` (flat index over all payloads).
    pub fn payload_section_addr(&self, i: usize) -> u32 {
        self.payload_base + i as u32 * self.section_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_partition_plan() {
        let cfg = StorageConfig::default();
        let map = AddressMap::new(&cfg);

        assert_eq!(map.tlb_base, 0);
        assert_eq!(map.fp_base, 256 * 1024);
        assert_eq!(map.fp_sections, 1);
        assert_eq!(map.payload_base, 512 * 1024);
        assert_eq!(map.payload_section_addr(3), 512 * 1024 + 3 * 256 * 1024);
    }

    #[test]
    fn plan_respects_flash_base() {
        let cfg = StorageConfig {
            flash_init: 0x100000,
            ..StorageConfig::default()
        };
        let map = AddressMap::new(&cfg);

        assert_eq!(map.tlb_base, 0x100000);
        assert_eq!(map.fp_base, 0x140000);
        assert_eq!(map.fp_section_addr(0), 0x140000);
    }
}
