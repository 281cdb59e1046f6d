//! Flight-plan storage engine
//!
//! Entries are appended to the live flash section at the position given
//! by the TLB's append cursor; lookups and deletes go through the TLB
//! and never touch flash. When the cursor reaches the end of the live
//! section the table is compacted: the section is read into RAM, erased,
//! and only the entries still referenced by the TLB are rewritten
//! densely from offset zero.

pub mod entry;
pub mod tlb;

pub use entry::{FpEntry, CMD_MAX_LEN, FP_ENTRY_SIZE, FP_NULL};
pub use tlb::TLB_SLOT_SIZE;

use crate::platform::traits::{FlashInterface, FramInterface};
use crate::storage::config::StorageConfig;
use crate::storage::error::{Result, StorageError};
use crate::storage::layout::AddressMap;
use crate::{log_debug, log_error, log_info, log_warn};
use tlb::Tlb;

#[derive(Debug)]
pub(crate) struct FlightPlanTable {
    /// Logical capacity (TLB slots in use)
    entries: usize,
    /// Base addresses of the flight-plan sections
    section_addr: Vec<u32>,
    tlb: Tlb,
}

impl FlightPlanTable {
    pub fn init<F: FlashInterface, M: FramInterface>(
        n_entries: usize,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<Self> {
        if n_entries == 0 || n_entries > cfg.fp_max_entries {
            return Err(StorageError::Bounds);
        }

        let section_addr: Vec<u32> = (0..map.fp_sections)
            .map(|i| map.fp_section_addr(i))
            .collect();
        log_debug!(
            "Flight plan sections: {} starting at {:#x}",
            section_addr.len(),
            map.fp_base
        );

        let mut tlb = Tlb::new(cfg.fp_max_entries);
        tlb.load(flash, fram, cfg, map)?;

        Ok(Self {
            entries: n_entries,
            section_addr,
            tlb,
        })
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Slots holding a live (non-tombstoned) entry.
    pub fn live_count(&self) -> usize {
        (0..self.entries)
            .filter(|&k| self.tlb.slot(k).unixtime != FP_NULL)
            .count()
    }

    fn flash_slot_addr(&self, index_flash: i32, cfg: &StorageConfig) -> Result<u32> {
        let cps = cfg.commands_per_section() as i32;
        let section = (index_flash / cps) as usize;
        let index_in_section = index_flash % cps;
        let base = self
            .section_addr
            .get(section)
            .copied()
            .ok_or(StorageError::Full)?;
        Ok(base + index_in_section as u32 * FP_ENTRY_SIZE as u32)
    }

    pub fn set<F: FlashInterface, M: FramInterface>(
        &mut self,
        entry: &FpEntry,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        // Compact once the cursor has consumed the live section
        if self.tlb.counter() >= cfg.commands_per_section() as i32 {
            self.rebuild(flash, fram, cfg, map)?;
        }

        let index_tlb = match self.tlb.find_index(FP_NULL, self.entries) {
            Some(k) => k,
            None => {
                log_error!("Flight plan TLB has no space for another command");
                return Err(StorageError::Full);
            }
        };

        let index_flash = self.tlb.counter();
        let addr = self.flash_slot_addr(index_flash, cfg)?;

        // The TLB is persisted before the record write: a reset in
        // between leaves a forward reference to unwritten flash, which
        // reads back as garbage until the operator purges.
        self.tlb
            .update(index_tlb, entry.unixtime, addr, flash, fram, cfg, map)?;
        flash.write(cfg.flash_partition, addr, &entry.encode())?;

        log_debug!(
            "Wrote flight plan time {} to flash slot {} at {:#x}",
            entry.unixtime,
            index_flash,
            addr
        );
        Ok(())
    }

    pub fn get<F: FlashInterface>(
        &self,
        unixtime: i32,
        flash: &mut F,
        cfg: &StorageConfig,
    ) -> Result<FpEntry> {
        let index = self
            .tlb
            .find_index(unixtime, self.entries)
            .ok_or(StorageError::NotFound)?;
        self.get_idx(index, flash, cfg)
    }

    pub fn get_idx<F: FlashInterface>(
        &self,
        index: usize,
        flash: &mut F,
        cfg: &StorageConfig,
    ) -> Result<FpEntry> {
        if index >= self.entries {
            return Err(StorageError::Bounds);
        }

        let slot = self.tlb.slot(index);
        if slot.unixtime == FP_NULL {
            return Err(StorageError::NotFound);
        }

        let mut buf = [0u8; FP_ENTRY_SIZE];
        flash.read(cfg.flash_partition, slot.addr as u32, &mut buf)?;
        Ok(FpEntry::decode(&buf))
    }

    pub fn delete<F: FlashInterface, M: FramInterface>(
        &mut self,
        unixtime: i32,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        let index = match self.tlb.find_index(unixtime, self.entries) {
            Some(k) => k,
            None => {
                log_warn!("Couldn't find command to erase at time {}", unixtime);
                return Err(StorageError::NotFound);
            }
        };
        self.delete_idx(index, flash, fram, cfg, map)
    }

    pub fn delete_idx<F: FlashInterface, M: FramInterface>(
        &mut self,
        index: usize,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        if index >= self.entries {
            log_warn!("Attempt to erase flight plan index {} out of bounds", index);
            return Err(StorageError::Bounds);
        }
        self.tlb.erase_index(index, flash, fram, cfg, map)
    }

    /// Erase every flight-plan section and persist the empty TLB.
    pub fn reset<F: FlashInterface, M: FramInterface>(
        &mut self,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        for &addr in &self.section_addr {
            flash.erase_section(cfg.flash_partition, addr)?;
            log_debug!("Deleted flight plan section at {:#x}", addr);
        }

        self.tlb.clear();
        self.tlb.dump(None, flash, fram, cfg, map)
    }

    /// Compaction: reclaim tombstoned flash slots and reset the cursor.
    fn rebuild<F: FlashInterface, M: FramInterface>(
        &mut self,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        log_info!("Rebuilding flight plan TLB");
        let cps = cfg.commands_per_section();

        // The whole live section comes to RAM before the erase
        let mut section = vec![0u8; cps * FP_ENTRY_SIZE];
        flash.read(cfg.flash_partition, self.section_addr[0], &mut section)?;
        flash.erase_section(cfg.flash_partition, self.section_addr[0])?;

        self.tlb.reset_counter();

        for index_tlb in 0..self.entries {
            let slot = self.tlb.slot(index_tlb);
            if slot.unixtime == FP_NULL {
                continue;
            }

            let old_index =
                (slot.addr as u32).wrapping_sub(self.section_addr[0]) as usize / FP_ENTRY_SIZE;
            if old_index >= cps {
                log_warn!(
                    "Flight plan TLB slot {} points outside the live section, dropping it",
                    index_tlb
                );
                self.tlb.erase_index(index_tlb, flash, fram, cfg, map)?;
                continue;
            }

            let new_addr = self.flash_slot_addr(self.tlb.counter(), cfg)?;
            self.tlb
                .update(index_tlb, slot.unixtime, new_addr, flash, fram, cfg, map)?;
            let record = &section[old_index * FP_ENTRY_SIZE..(old_index + 1) * FP_ENTRY_SIZE];
            flash.write(cfg.flash_partition, new_addr, record)?;
        }

        self.tlb.dump(None, flash, fram, cfg, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockFlash, MockFram};

    // Four 512-byte commands per 2 KiB section, four TLB slots
    fn small_config() -> StorageConfig {
        StorageConfig {
            section_size: 2048,
            fram_size: 1024,
            fp_max_entries: 4,
            ..StorageConfig::default()
        }
    }

    struct Rig {
        flash: MockFlash,
        fram: MockFram,
        cfg: StorageConfig,
        map: AddressMap,
        table: FlightPlanTable,
    }

    fn rig() -> Rig {
        let cfg = small_config();
        let map = AddressMap::new(&cfg);
        let mut flash = MockFlash::new(8, cfg.section_size, cfg.page_size);
        let mut fram = MockFram::new(cfg.fram_size);
        let table =
            FlightPlanTable::init(cfg.fp_max_entries, &mut flash, &mut fram, &cfg, &map).unwrap();
        Rig {
            flash,
            fram,
            cfg,
            map,
            table,
        }
    }

    impl Rig {
        fn set(&mut self, unixtime: i32) -> Result<()> {
            let entry = FpEntry::new(unixtime, "ping", "5", 1, 0, 1);
            self.table
                .set(&entry, &mut self.flash, &mut self.fram, &self.cfg, &self.map)
        }

        fn get(&mut self, unixtime: i32) -> Result<FpEntry> {
            self.table.get(unixtime, &mut self.flash, &self.cfg)
        }

        fn delete(&mut self, unixtime: i32) -> Result<()> {
            self.table.delete(
                unixtime,
                &mut self.flash,
                &mut self.fram,
                &self.cfg,
                &self.map,
            )
        }
    }

    #[test]
    fn set_then_get_by_time() {
        let mut rig = rig();

        rig.set(4000).unwrap();
        let entry = rig.get(4000).unwrap();

        assert_eq!(entry.unixtime, 4000);
        assert_eq!(entry.cmd.as_str(), "ping");
        assert_eq!(entry.args.as_str(), "5");
    }

    #[test]
    fn delete_is_tombstone_only() {
        let mut rig = rig();

        rig.set(4000).unwrap();
        rig.delete(4000).unwrap();

        assert_eq!(rig.get(4000).unwrap_err(), StorageError::NotFound);
        // Flash was never erased; the record bytes are still there
        assert_eq!(rig.flash.total_erase_count(), 0);
        let first = rig.flash.contents(rig.map.fp_base, 4);
        assert_eq!(first, 4000i32.to_le_bytes().to_vec());
    }

    #[test]
    fn full_table_reports_no_space() {
        let mut rig = rig();

        for t in [100, 200, 300, 400] {
            rig.set(t).unwrap();
        }
        assert_eq!(rig.set(500).unwrap_err(), StorageError::Full);
    }

    #[test]
    fn fill_and_compact_reclaims_tombstones() {
        let mut rig = rig();

        rig.set(100).unwrap();
        rig.set(200).unwrap();
        rig.set(300).unwrap();
        rig.delete(200).unwrap();
        rig.set(400).unwrap();

        // Four slots allocated; the fifth insert triggers compaction
        assert_eq!(rig.table.tlb.counter(), 4);
        rig.set(500).unwrap();

        assert_eq!(rig.flash.erase_count(rig.map.fp_base), 1);
        assert_eq!(rig.table.tlb.counter(), 4);
        for t in [100, 300, 400, 500] {
            assert_eq!(rig.get(t).unwrap().unixtime, t);
        }
        assert_eq!(rig.get(200).unwrap_err(), StorageError::NotFound);
    }

    #[test]
    fn compaction_packs_entries_densely() {
        let mut rig = rig();

        for t in [100, 200, 300, 400] {
            rig.set(t).unwrap();
        }
        rig.delete(100).unwrap();
        rig.delete(300).unwrap();
        rig.set(500).unwrap();

        // 200, 400 compacted to slots 0-1, 500 appended at slot 2
        assert_eq!(rig.table.tlb.counter(), 3);
        assert_eq!(rig.table.live_count(), 3);
        let first = rig.flash.contents(rig.map.fp_base, 4);
        assert_eq!(first, 200i32.to_le_bytes().to_vec());
    }

    #[test]
    fn reset_clears_everything_and_is_idempotent() {
        let mut rig = rig();

        rig.set(100).unwrap();
        rig.set(200).unwrap();

        let reset =
            |rig: &mut Rig| {
                rig.table
                    .reset(&mut rig.flash, &mut rig.fram, &rig.cfg, &rig.map)
            };
        reset(&mut rig).unwrap();

        for k in 0..rig.cfg.fp_max_entries {
            assert_eq!(
                rig.table.get_idx(k, &mut rig.flash, &rig.cfg).unwrap_err(),
                StorageError::NotFound
            );
        }
        assert_eq!(rig.table.tlb.counter(), 0);

        // Second reset is a no-op observable-wise
        reset(&mut rig).unwrap();
        assert_eq!(rig.table.live_count(), 0);
    }

    #[test]
    fn tlb_survives_reinit_from_backup() {
        let mut rig = rig();

        rig.set(100).unwrap();
        rig.set(200).unwrap();
        rig.delete(100).unwrap();

        // Simulated reboot: rebuild the table state from the backup
        let mut table = FlightPlanTable::init(
            rig.cfg.fp_max_entries,
            &mut rig.flash,
            &mut rig.fram,
            &rig.cfg,
            &rig.map,
        )
        .unwrap();

        assert_eq!(
            table.get(100, &mut rig.flash, &rig.cfg).unwrap_err(),
            StorageError::NotFound
        );
        assert_eq!(
            table.get(200, &mut rig.flash, &rig.cfg).unwrap().unixtime,
            200
        );
        assert_eq!(table.live_count(), 1);

        // The cursor also survived, so the next insert appends
        let entry = FpEntry::new(300, "ping", "", 1, 0, 1);
        table
            .set(&entry, &mut rig.flash, &mut rig.fram, &rig.cfg, &rig.map)
            .unwrap();
        assert_eq!(table.tlb.counter(), 3);
    }

    #[test]
    fn duplicate_times_resolve_to_lowest_slot() {
        let mut rig = rig();

        rig.set(700).unwrap();
        rig.set(700).unwrap();

        // Only the lowest-indexed entry is findable by time while both
        // exist; deleting it uncovers the duplicate.
        assert_eq!(rig.table.live_count(), 2);
        rig.delete(700).unwrap();
        assert_eq!(rig.table.live_count(), 1);
        assert_eq!(rig.get(700).unwrap().unixtime, 700);
    }

    #[test]
    fn get_idx_bounds() {
        let mut rig = rig();
        rig.set(100).unwrap();

        assert!(rig.table.get_idx(0, &mut rig.flash, &rig.cfg).is_ok());
        assert_eq!(
            rig.table
                .get_idx(rig.cfg.fp_max_entries, &mut rig.flash, &rig.cfg)
                .unwrap_err(),
            StorageError::Bounds
        );
    }
}
