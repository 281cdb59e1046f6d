//! Storage engine
//!
//! [`Storage`] is the single owning value behind which all persistent
//! state lives: the media backends, the resolved partition plan, and the
//! three tables (status, flight plan, payload). It is not thread-safe by
//! itself; the repository façade in [`crate::repo`] serialises access
//! through one mutex.

pub mod config;
pub mod error;
pub mod flight_plan;
pub mod layout;
pub mod payload;
pub mod status;
pub mod value;

pub use config::{StorageConfig, TlbLocation};
pub use error::{Result, StorageError};
pub use flight_plan::{FpEntry, CMD_MAX_LEN, FP_ENTRY_SIZE, FP_NULL};
pub use payload::{payload_fprint, payload_print, PayloadSchema, STR_FIELD_SIZE};
pub use value::Value32;

use crate::log_info;
use crate::platform::traits::{FlashInterface, FramInterface};
use flight_plan::FlightPlanTable;
use layout::AddressMap;
use payload::PayloadTable;
use status::StatusTable;

/// The storage engine over a flash and an FRAM backend.
#[derive(Debug)]
pub struct Storage<F: FlashInterface, M: FramInterface> {
    flash: F,
    fram: M,
    config: StorageConfig,
    map: AddressMap,
    status: Option<StatusTable>,
    flight_plan: Option<FlightPlanTable>,
    payload: Option<PayloadTable>,
    is_open: bool,
}

impl<F: FlashInterface, M: FramInterface> Storage<F, M> {
    /// Open the engine: validate the configuration against the media
    /// geometry and compute the partition plan. Tables are initialized
    /// separately.
    pub fn open(flash: F, fram: M, config: StorageConfig) -> Result<Self> {
        config.validate()?;

        if flash.section_size() != config.section_size || flash.page_size() != config.page_size {
            return Err(StorageError::Config("flash geometry mismatch"));
        }
        if fram.size() < config.fram_size {
            return Err(StorageError::Config("FRAM smaller than configured"));
        }

        let map = AddressMap::new(&config);
        if map.payload_base > flash.capacity() {
            return Err(StorageError::Config(
                "flight plan sections exceed the flash capacity",
            ));
        }

        log_info!(
            "Storage open: flight plan at {:#x}, payloads at {:#x}",
            map.fp_base,
            map.payload_base
        );

        Ok(Self {
            flash,
            fram,
            config,
            map,
            status: None,
            flight_plan: None,
            payload: None,
            is_open: true,
        })
    }

    /// Close the engine. Further operations fail with
    /// [`StorageError::NotOpen`] until the media are recovered with
    /// [`Storage::into_media`] and reopened.
    pub fn close(&mut self) {
        self.is_open = false;
        self.status = None;
        self.flight_plan = None;
        self.payload = None;
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Hand the media back, e.g. to reopen after a simulated reset.
    pub fn into_media(self) -> (F, M) {
        (self.flash, self.fram)
    }

    /// Direct access to the flash backend (diagnostics and tests).
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Direct access to the FRAM backend (diagnostics and tests).
    pub fn fram_mut(&mut self) -> &mut M {
        &mut self.fram
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open {
            Ok(())
        } else {
            Err(StorageError::NotOpen)
        }
    }

    // -- Status table --

    /// Initialize the status table of `n_vars` logical variables.
    ///
    /// FRAM values survive reset; `drop` zeroes every copy of every
    /// slot. Re-initializing without `drop` is an error.
    pub fn status_init(&mut self, n_vars: usize, drop: bool) -> Result<()> {
        self.ensure_open()?;
        if self.status.is_some() && !drop {
            return Err(StorageError::AlreadyInitialized);
        }
        if n_vars == 0 {
            return Err(StorageError::Bounds);
        }

        let table = StatusTable::new(n_vars, self.config.triple_writing);
        // Status region and TLB backup share the FRAM
        if table.fram_bytes() as u32 > self.config.tlb_fram_addr() {
            return Err(StorageError::Config("status table overlaps the TLB backup"));
        }
        if drop {
            table.clear(&mut self.fram)?;
        }

        self.status = Some(table);
        Ok(())
    }

    pub fn status_get(&mut self, index: usize) -> Result<Value32> {
        self.ensure_open()?;
        let table = self.status.as_ref().ok_or(StorageError::NotInitialized)?;
        table.get(&mut self.fram, index)
    }

    pub fn status_set(&mut self, index: usize, value: Value32) -> Result<()> {
        self.ensure_open()?;
        let table = self.status.as_ref().ok_or(StorageError::NotInitialized)?;
        table.set(&mut self.fram, index, value)
    }

    // -- Flight plan --

    /// Initialize the flight-plan table with `n_entries` logical slots
    /// and reload the TLB from its backup. With `drop` the table is
    /// reset after loading.
    pub fn flight_plan_init(&mut self, n_entries: usize, drop: bool) -> Result<()> {
        self.ensure_open()?;
        if self.flight_plan.is_some() && !drop {
            return Err(StorageError::AlreadyInitialized);
        }

        let mut table = FlightPlanTable::init(
            n_entries,
            &mut self.flash,
            &mut self.fram,
            &self.config,
            &self.map,
        )?;
        if drop {
            table.reset(&mut self.flash, &mut self.fram, &self.config, &self.map)?;
        }

        self.flight_plan = Some(table);
        Ok(())
    }

    /// Logical flight-plan capacity.
    pub fn flight_plan_capacity(&self) -> Result<usize> {
        self.ensure_open()?;
        self.flight_plan
            .as_ref()
            .map(FlightPlanTable::entries)
            .ok_or(StorageError::NotInitialized)
    }

    /// Number of live (non-tombstoned) entries.
    pub fn flight_plan_live_count(&self) -> Result<usize> {
        self.ensure_open()?;
        self.flight_plan
            .as_ref()
            .map(FlightPlanTable::live_count)
            .ok_or(StorageError::NotInitialized)
    }

    pub fn flight_plan_set(&mut self, entry: &FpEntry) -> Result<()> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_mut()
            .ok_or(StorageError::NotInitialized)?;
        table.set(
            entry,
            &mut self.flash,
            &mut self.fram,
            &self.config,
            &self.map,
        )
    }

    pub fn flight_plan_get(&mut self, unixtime: i32) -> Result<FpEntry> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_ref()
            .ok_or(StorageError::NotInitialized)?;
        table.get(unixtime, &mut self.flash, &self.config)
    }

    pub fn flight_plan_get_idx(&mut self, index: usize) -> Result<FpEntry> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_ref()
            .ok_or(StorageError::NotInitialized)?;
        table.get_idx(index, &mut self.flash, &self.config)
    }

    pub fn flight_plan_delete(&mut self, unixtime: i32) -> Result<()> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_mut()
            .ok_or(StorageError::NotInitialized)?;
        table.delete(
            unixtime,
            &mut self.flash,
            &mut self.fram,
            &self.config,
            &self.map,
        )
    }

    pub fn flight_plan_delete_idx(&mut self, index: usize) -> Result<()> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_mut()
            .ok_or(StorageError::NotInitialized)?;
        table.delete_idx(
            index,
            &mut self.flash,
            &mut self.fram,
            &self.config,
            &self.map,
        )
    }

    pub fn flight_plan_reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        let table = self
            .flight_plan
            .as_mut()
            .ok_or(StorageError::NotInitialized)?;
        table.reset(&mut self.flash, &mut self.fram, &self.config, &self.map)
    }

    // -- Payload store --

    /// Initialize the payload store for the given schemas.
    pub fn payload_init(&mut self, schemas: &[PayloadSchema], drop: bool) -> Result<()> {
        self.ensure_open()?;
        if self.payload.is_some() && !drop {
            return Err(StorageError::AlreadyInitialized);
        }

        let table = PayloadTable::init(schemas, &self.config, &self.map, self.flash.capacity())?;
        self.payload = Some(table);
        Ok(())
    }

    pub fn payload_set_data(
        &mut self,
        payload: usize,
        index: usize,
        data: &[u8],
        schema: &PayloadSchema,
    ) -> Result<()> {
        self.ensure_open()?;
        let table = self.payload.as_ref().ok_or(StorageError::NotInitialized)?;
        table.set_data(payload, index, data, schema, &mut self.flash, &self.config)
    }

    pub fn payload_get_data(
        &mut self,
        payload: usize,
        index: usize,
        buf: &mut [u8],
        schema: &PayloadSchema,
    ) -> Result<()> {
        self.ensure_open()?;
        let table = self.payload.as_ref().ok_or(StorageError::NotInitialized)?;
        table.get_data(payload, index, buf, schema, &mut self.flash, &self.config)
    }

    pub fn payload_reset_table(&mut self, payload: usize) -> Result<()> {
        self.ensure_open()?;
        let table = self.payload.as_ref().ok_or(StorageError::NotInitialized)?;
        table.reset_table(payload, &mut self.flash, &self.config)
    }

    pub fn payload_reset(&mut self) -> Result<()> {
        self.ensure_open()?;
        let table = self.payload.as_ref().ok_or(StorageError::NotInitialized)?;
        table.reset(&mut self.flash, &self.config)
    }
}
