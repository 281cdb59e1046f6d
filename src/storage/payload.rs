//! Payload sample store
//!
//! Each payload owns a contiguous run of flash sections holding an
//! append-only sequence of fixed-size records. Record placement packs
//! whole records into pages (a record never straddles a page boundary)
//! and every access re-checks the alignment before touching the medium.
//!
//! Record layouts are described by a [`PayloadSchema`]: the record size
//! plus a whitespace-separated list of printf-style type tokens used to
//! serialize samples for the ground segment.

use crate::log_debug;
use crate::platform::traits::FlashInterface;
use crate::repo::vars::StatusAddress;
use crate::storage::config::StorageConfig;
use crate::storage::error::{Result, StorageError};
use crate::storage::layout::AddressMap;
use std::io::{self, Write};

/// Fixed size of `%s` fields inside payload records.
pub const STR_FIELD_SIZE: usize = 32;

/// Binary layout and bookkeeping description of one payload's records.
#[derive(Debug, Clone)]
pub struct PayloadSchema {
    /// Record size in bytes (at most one page)
    pub size: u16,
    /// Status variable holding the payload's next write index
    pub sys_var: StatusAddress,
    /// Whitespace-separated printf-style type tokens (`%f %d %u %h %s`)
    pub data_order: &'static str,
    /// Whitespace-separated field names, parallel to `data_order`
    pub var_names: &'static str,
}

/// A record `[addr, addr + size)` must lie entirely within one page.
pub(crate) fn check_address_alignment(addr: u32, size: u16, page_size: u32) -> Result<()> {
    if size == 0 {
        return Err(StorageError::Bounds);
    }
    if (addr + size as u32 - 1) / page_size > addr / page_size {
        return Err(StorageError::Alignment);
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct PayloadTable {
    /// Number of configured payloads
    entries: usize,
    /// Base addresses, `sections_per_payload` consecutive per payload
    section_addr: Vec<u32>,
}

impl PayloadTable {
    pub fn init(
        schemas: &[PayloadSchema],
        cfg: &StorageConfig,
        map: &AddressMap,
        flash_capacity: u32,
    ) -> Result<Self> {
        if schemas.is_empty() || schemas.len() > cfg.max_payloads {
            return Err(StorageError::Bounds);
        }
        for schema in schemas {
            if schema.size == 0 || schema.size as u32 > cfg.page_size {
                return Err(StorageError::Bounds);
            }
        }

        let sections = cfg.sections_per_payload * schemas.len();
        let section_addr: Vec<u32> = (0..sections)
            .map(|i| map.payload_section_addr(i))
            .collect();

        let end = map.payload_section_addr(sections);
        if end > flash_capacity {
            return Err(StorageError::Config(
                "payload sections exceed the flash capacity",
            ));
        }
        log_debug!(
            "Payload sections: {} starting at {:#x}",
            sections,
            map.payload_base
        );

        Ok(Self {
            entries: schemas.len(),
            section_addr,
        })
    }

    /// Flash address of sample `index` of `payload`.
    ///
    /// Records are packed per page (`page / size` records each), pages
    /// per section, and `sections_per_payload` sections per payload.
    fn sample_address(
        &self,
        payload: usize,
        index: usize,
        size: u16,
        cfg: &StorageConfig,
    ) -> Result<u32> {
        let page = cfg.page_size as usize;
        let size = size as usize;
        if size == 0 || size > page || payload >= self.entries {
            return Err(StorageError::Bounds);
        }

        let samples_per_page = page / size;
        let pages_in_section = cfg.section_size as usize / page;
        let samples_per_section = samples_per_page * pages_in_section;

        let sample_section = index / samples_per_section;
        if sample_section >= cfg.sections_per_payload {
            return Err(StorageError::Bounds);
        }

        let section_index = payload * cfg.sections_per_payload + sample_section;
        let sample_page = (index / samples_per_page) % pages_in_section;
        let index_in_page = index % samples_per_page;

        Ok(self.section_addr[section_index]
            + (sample_page * page) as u32
            + (index_in_page * size) as u32)
    }

    pub fn set_data<F: FlashInterface>(
        &self,
        payload: usize,
        index: usize,
        data: &[u8],
        schema: &PayloadSchema,
        flash: &mut F,
        cfg: &StorageConfig,
    ) -> Result<()> {
        if data.len() != schema.size as usize {
            return Err(StorageError::Bounds);
        }

        let addr = self.sample_address(payload, index, schema.size, cfg)?;
        check_address_alignment(addr, schema.size, cfg.page_size)?;
        log_debug!("Writing payload {} sample {} at {:#x}", payload, index, addr);
        flash.write(cfg.flash_partition, addr, data)?;
        Ok(())
    }

    pub fn get_data<F: FlashInterface>(
        &self,
        payload: usize,
        index: usize,
        buf: &mut [u8],
        schema: &PayloadSchema,
        flash: &mut F,
        cfg: &StorageConfig,
    ) -> Result<()> {
        if buf.len() != schema.size as usize {
            return Err(StorageError::Bounds);
        }

        let addr = self.sample_address(payload, index, schema.size, cfg)?;
        check_address_alignment(addr, schema.size, cfg.page_size)?;
        flash.read(cfg.flash_partition, addr, buf)?;
        Ok(())
    }

    /// Erase every section of one payload.
    pub fn reset_table<F: FlashInterface>(
        &self,
        payload: usize,
        flash: &mut F,
        cfg: &StorageConfig,
    ) -> Result<()> {
        if payload >= self.entries {
            return Err(StorageError::Bounds);
        }

        for i in 0..cfg.sections_per_payload {
            let addr = self.section_addr[payload * cfg.sections_per_payload + i];
            flash.erase_section(cfg.flash_partition, addr)?;
            log_debug!("Deleted payload {} section at {:#x}", payload, addr);
        }
        Ok(())
    }

    /// Erase every payload.
    pub fn reset<F: FlashInterface>(&self, flash: &mut F, cfg: &StorageConfig) -> Result<()> {
        for payload in 0..self.entries {
            self.reset_table(payload, flash, cfg)?;
        }
        Ok(())
    }
}

/// Serialize one record as a CSV line according to `schema.data_order`.
pub fn payload_fprint<W: Write>(w: &mut W, data: &[u8], schema: &PayloadSchema) -> io::Result<()> {
    let mut offset = 0usize;
    for token in schema.data_order.split_whitespace() {
        write_field(w, data, &mut offset, token)?;
        write!(w, ",")?;
    }
    writeln!(w)
}

/// Print one record as `name: value` lines, pairing `data_order` tokens
/// with `var_names`.
pub fn payload_print<W: Write>(w: &mut W, data: &[u8], schema: &PayloadSchema) -> io::Result<()> {
    let mut offset = 0usize;
    let names = schema.var_names.split_whitespace();
    for (token, name) in schema.data_order.split_whitespace().zip(names) {
        write!(w, "{}: ", name)?;
        write_field(w, data, &mut offset, token)?;
        writeln!(w)?;
    }
    Ok(())
}

fn write_field<W: Write>(
    w: &mut W,
    data: &[u8],
    offset: &mut usize,
    token: &str,
) -> io::Result<()> {
    let take = |offset: &mut usize, n: usize| -> io::Result<&[u8]> {
        let start = *offset;
        let end = start + n;
        if end > data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "record shorter than its schema",
            ));
        }
        *offset = end;
        Ok(&data[start..end])
    };

    match token.as_bytes().get(1) {
        Some(b'f') => {
            let bytes = take(offset, 4)?;
            let v = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            write!(w, "{}", v)
        }
        Some(b'u') => {
            let bytes = take(offset, 4)?;
            let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            write!(w, "{}", v)
        }
        Some(b'i') | Some(b'd') => {
            let bytes = take(offset, 4)?;
            let v = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            write!(w, "{}", v)
        }
        Some(b'h') => {
            let bytes = take(offset, 2)?;
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            write!(w, "{}", v)
        }
        Some(b's') => {
            let bytes = take(offset, STR_FIELD_SIZE)?;
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            write!(w, "{}", String::from_utf8_lossy(&bytes[..end]))
        }
        _ => {
            // Unknown token: skip one byte, print nothing
            take(offset, 1)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockFlash;

    // Two 2 KiB sections per payload, 512-byte pages
    fn small_config() -> StorageConfig {
        StorageConfig {
            section_size: 2048,
            fram_size: 1024,
            fp_max_entries: 4,
            sections_per_payload: 2,
            max_payloads: 4,
            ..StorageConfig::default()
        }
    }

    fn schema(size: u16) -> PayloadSchema {
        PayloadSchema {
            size,
            sys_var: StatusAddress::DrpIdx0,
            data_order: "%f %d",
            var_names: "temp count",
        }
    }

    fn rig(n_payloads: usize) -> (PayloadTable, MockFlash, StorageConfig, AddressMap) {
        let cfg = small_config();
        let map = AddressMap::new(&cfg);
        let flash = MockFlash::new(16, cfg.section_size, cfg.page_size);
        let schemas: Vec<PayloadSchema> = (0..n_payloads).map(|_| schema(8)).collect();
        let table = PayloadTable::init(&schemas, &cfg, &map, flash.capacity()).unwrap();
        (table, flash, cfg, map)
    }

    #[test]
    fn alignment_check_rejects_straddle() {
        // Bytes 400..599 cross the boundary at 512
        assert_eq!(
            check_address_alignment(400, 200, 512).unwrap_err(),
            StorageError::Alignment
        );
        // 512..711 lies inside the second page
        check_address_alignment(512, 200, 512).unwrap();
        // An exact page fit is legal
        check_address_alignment(0, 512, 512).unwrap();
    }

    #[test]
    fn sample_placement_skips_page_remainders() {
        let (table, _, cfg, _) = rig(1);
        let base = table.section_addr[0];

        // 200-byte records: two per page, remainder unused
        assert_eq!(table.sample_address(0, 0, 200, &cfg).unwrap(), base);
        assert_eq!(table.sample_address(0, 1, 200, &cfg).unwrap(), base + 200);
        assert_eq!(table.sample_address(0, 2, 200, &cfg).unwrap(), base + 512);
        assert_eq!(table.sample_address(0, 3, 200, &cfg).unwrap(), base + 712);
    }

    #[test]
    fn placed_samples_never_straddle_pages() {
        let (table, _, cfg, _) = rig(1);
        for index in 0..16 {
            let addr = table.sample_address(0, index, 200, &cfg).unwrap();
            check_address_alignment(addr, 200, cfg.page_size).unwrap();
        }
    }

    #[test]
    fn samples_roll_into_following_sections() {
        let (table, _, cfg, _) = rig(2);

        // 64 records of 8 bytes per page, 4 pages per section
        let per_section = 64 * 4;
        let addr = table.sample_address(1, per_section, 8, &cfg).unwrap();
        assert_eq!(addr, table.section_addr[3]);

        // Beyond the payload's run of sections
        assert_eq!(
            table
                .sample_address(1, 2 * per_section, 8, &cfg)
                .unwrap_err(),
            StorageError::Bounds
        );
    }

    #[test]
    fn set_get_roundtrip() {
        let (table, mut flash, cfg, _) = rig(2);
        let schema = schema(8);

        let record = [1u8, 2, 3, 4, 5, 6, 7, 8];
        table
            .set_data(1, 5, &record, &schema, &mut flash, &cfg)
            .unwrap();

        let mut buf = [0u8; 8];
        table
            .get_data(1, 5, &mut buf, &schema, &mut flash, &cfg)
            .unwrap();
        assert_eq!(buf, record);
    }

    #[test]
    fn oversized_record_rejected() {
        let cfg = small_config();
        let map = AddressMap::new(&cfg);
        let flash = MockFlash::new(16, cfg.section_size, cfg.page_size);

        let schemas = [schema(600)];
        assert_eq!(
            PayloadTable::init(&schemas, &cfg, &map, flash.capacity()).unwrap_err(),
            StorageError::Bounds
        );
    }

    #[test]
    fn wrong_buffer_length_rejected() {
        let (table, mut flash, cfg, _) = rig(1);
        let schema = schema(8);

        assert_eq!(
            table
                .set_data(0, 0, &[0u8; 4], &schema, &mut flash, &cfg)
                .unwrap_err(),
            StorageError::Bounds
        );
    }

    #[test]
    fn reset_table_erases_only_that_payload() {
        let (table, mut flash, cfg, _) = rig(2);
        let schema = schema(8);

        table
            .set_data(0, 0, &[0xAA; 8], &schema, &mut flash, &cfg)
            .unwrap();
        table
            .set_data(1, 0, &[0xBB; 8], &schema, &mut flash, &cfg)
            .unwrap();

        table.reset_table(0, &mut flash, &cfg).unwrap();

        let mut buf = [0u8; 8];
        table
            .get_data(0, 0, &mut buf, &schema, &mut flash, &cfg)
            .unwrap();
        assert_eq!(buf, [0xFF; 8]);
        table
            .get_data(1, 0, &mut buf, &schema, &mut flash, &cfg)
            .unwrap();
        assert_eq!(buf, [0xBB; 8]);
    }

    #[test]
    fn fprint_emits_csv() {
        let schema = PayloadSchema {
            size: 10,
            sys_var: StatusAddress::DrpIdx0,
            data_order: "%f %d %h",
            var_names: "volt count flags",
        };

        let mut record = Vec::new();
        record.extend_from_slice(&1.5f32.to_le_bytes());
        record.extend_from_slice(&(-7i32).to_le_bytes());
        record.extend_from_slice(&258i16.to_le_bytes());

        let mut out = Vec::new();
        payload_fprint(&mut out, &record, &schema).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1.5,-7,258,\n");
    }

    #[test]
    fn print_pairs_names_with_values() {
        let schema = PayloadSchema {
            size: 8,
            sys_var: StatusAddress::DrpIdx0,
            data_order: "%u %f",
            var_names: "seq temp",
        };

        let mut record = Vec::new();
        record.extend_from_slice(&9u32.to_le_bytes());
        record.extend_from_slice(&0.25f32.to_le_bytes());

        let mut out = Vec::new();
        payload_print(&mut out, &record, &schema).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "seq: 9\ntemp: 0.25\n");
    }

    #[test]
    fn fprint_handles_string_fields() {
        let schema = PayloadSchema {
            size: 36,
            sys_var: StatusAddress::DrpIdx0,
            data_order: "%d %s",
            var_names: "id name",
        };

        let mut record = vec![0u8; 36];
        record[0..4].copy_from_slice(&3i32.to_le_bytes());
        record[4..8].copy_from_slice(b"gyro");

        let mut out = Vec::new();
        payload_fprint(&mut out, &record, &schema).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3,gyro,\n");
    }

    #[test]
    fn fprint_short_record_fails_cleanly() {
        let schema = schema(8);
        let mut out = Vec::new();
        let err = payload_fprint(&mut out, &[0u8; 2], &schema).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
