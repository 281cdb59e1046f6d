//! Flight-plan translation look-aside buffer
//!
//! Flash rewrites are slow because they imply reading, erasing and
//! rewriting a whole 256 KiB section, and flight-plan searches are
//! sequential. The TLB is a RAM index from scheduled unixtime to the
//! entry's flash address: lookups and deletes touch only the TLB, and
//! entries are never deleted from flash until the live section fills and
//! gets compacted.
//!
//! The table is backed up to non-volatile memory (FRAM, or optionally a
//! flash section) on every mutation so a reset reconstructs it.
//!
//! Slot `n_max` is metadata: its `addr` field is the append cursor, the
//! number of physical flash slots ever allocated in the live section.

use crate::platform::traits::{FlashInterface, FramInterface};
use crate::storage::config::{StorageConfig, TlbLocation};
use crate::storage::error::Result;
use crate::storage::flight_plan::entry::FP_NULL;
use crate::storage::layout::AddressMap;

/// Serialized slot size in bytes.
pub const TLB_SLOT_SIZE: usize = 8;

/// One TLB slot: scheduled time plus flash address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TlbSlot {
    pub unixtime: i32,
    pub addr: i32,
}

impl TlbSlot {
    pub const EMPTY: TlbSlot = TlbSlot {
        unixtime: FP_NULL,
        addr: FP_NULL,
    };

    fn encode(self) -> [u8; TLB_SLOT_SIZE] {
        let mut buf = [0u8; TLB_SLOT_SIZE];
        buf[0..4].copy_from_slice(&self.unixtime.to_le_bytes());
        buf[4..8].copy_from_slice(&self.addr.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            unixtime: i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            addr: i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Tlb {
    /// `n_max` entry slots plus the metadata slot
    slots: Vec<TlbSlot>,
}

impl Tlb {
    pub fn new(n_max: usize) -> Self {
        Self {
            slots: vec![TlbSlot::EMPTY; n_max + 1],
        }
    }

    fn n_max(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn slot(&self, index: usize) -> TlbSlot {
        self.slots[index]
    }

    /// Append cursor: physical flash slots allocated since the last
    /// compaction.
    pub fn counter(&self) -> i32 {
        self.slots[self.n_max()].addr
    }

    /// First slot (lowest index) whose time matches, scanning the first
    /// `limit` slots. Searching for `FP_NULL` finds a free slot.
    pub fn find_index(&self, unixtime: i32, limit: usize) -> Option<usize> {
        self.slots[..limit.min(self.n_max())]
            .iter()
            .position(|slot| slot.unixtime == unixtime)
    }

    /// Back to the empty state: every slot tombstoned, cursor zero.
    /// Callers persist with [`Tlb::dump`].
    pub fn clear(&mut self) {
        self.slots.fill(TlbSlot::EMPTY);
        self.reset_counter();
    }

    /// Reset the metadata slot only (compaction start).
    pub fn reset_counter(&mut self) {
        let n = self.n_max();
        self.slots[n] = TlbSlot { unixtime: 0, addr: 0 };
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.slots.len() * TLB_SLOT_SIZE);
        for slot in &self.slots {
            buf.extend_from_slice(&slot.encode());
        }
        buf
    }

    fn deserialize(&mut self, buf: &[u8]) {
        for (i, chunk) in buf.chunks_exact(TLB_SLOT_SIZE).enumerate() {
            self.slots[i] = TlbSlot::decode(chunk);
        }
    }

    /// Load the backup from non-volatile memory.
    ///
    /// A cold medium reads back all 0xFF, which decodes every field to
    /// −1: the empty table. The append cursor is normalised to zero in
    /// that case so the first write lands at the section base.
    pub fn load<F: FlashInterface, M: FramInterface>(
        &mut self,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        let mut buf = vec![0u8; cfg.tlb_bytes()];
        match cfg.tlb_location {
            TlbLocation::Fram => fram.read(cfg.tlb_fram_addr(), &mut buf)?,
            TlbLocation::Flash => flash.read(cfg.flash_partition, map.tlb_base, &mut buf)?,
        }
        self.deserialize(&buf);

        let n = self.n_max();
        if self.slots[n] == TlbSlot::EMPTY {
            self.reset_counter();
        }
        Ok(())
    }

    /// Persist slot `index`, or the whole table for `None`.
    ///
    /// In flash mode slot-level dumps still erase and rewrite the whole
    /// backup section in page-sized chunks; slot boundaries coincide
    /// with page boundaries (validated by the configuration).
    pub fn dump<F: FlashInterface, M: FramInterface>(
        &self,
        index: Option<usize>,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        match cfg.tlb_location {
            TlbLocation::Fram => {
                let base = cfg.tlb_fram_addr();
                match index {
                    Some(k) => {
                        fram.write(base + (k * TLB_SLOT_SIZE) as u32, &self.slots[k].encode())?
                    }
                    None => fram.write(base, &self.serialize())?,
                }
            }
            TlbLocation::Flash => {
                flash.erase_section(cfg.flash_partition, map.tlb_base)?;
                let bytes = self.serialize();
                let page = cfg.page_size as usize;
                for off in (0..bytes.len()).step_by(page) {
                    let end = (off + page).min(bytes.len());
                    flash.write(cfg.flash_partition, map.tlb_base + off as u32, &bytes[off..end])?;
                }
            }
        }
        Ok(())
    }

    /// Set slot `index`, advance the append cursor, persist both slots.
    pub fn update<F: FlashInterface, M: FramInterface>(
        &mut self,
        index: usize,
        unixtime: i32,
        addr: u32,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        self.slots[index] = TlbSlot {
            unixtime,
            addr: addr as i32,
        };
        let n = self.n_max();
        self.slots[n].addr += 1;

        self.dump(Some(index), flash, fram, cfg, map)?;
        self.dump(Some(n), flash, fram, cfg, map)
    }

    /// Tombstone slot `index` and persist it. Flash is not touched.
    pub fn erase_index<F: FlashInterface, M: FramInterface>(
        &mut self,
        index: usize,
        flash: &mut F,
        fram: &mut M,
        cfg: &StorageConfig,
        map: &AddressMap,
    ) -> Result<()> {
        self.slots[index] = TlbSlot::EMPTY;
        self.dump(Some(index), flash, fram, cfg, map)
    }
}
