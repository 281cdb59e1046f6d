//! Data repository façade
//!
//! [`DataRepo`] is the entry point the rest of the flight software uses.
//! It serialises every storage call through one mutex, keeps the derived
//! counter variables in the status table (`fpl_queue`, the per-payload
//! write indexes), and offers the typed views the subsystems want:
//! values by name, the attitude quaternion, angular rates.
//!
//! Counters advance only when the underlying operation succeeded, and
//! counter updates re-acquire the lock after the storage call has
//! released it, so a single lock order covers every path.

pub mod vars;

pub use vars::{var_by_name, StatusAddress, StatusVarDef, MAX_PAYLOAD_COUNTERS, STATUS_VAR_DEFS};

use crate::core::time::Clock;
use crate::platform::traits::{FlashInterface, FramInterface};
use crate::storage::{
    FpEntry, PayloadSchema, Result, Storage, StorageError, Value32,
};
use crate::{log_error, log_trace, log_warn};
use nalgebra::{Quaternion, Vector3};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

const QUAT_ADDRS: [StatusAddress; 4] = [
    StatusAddress::AdsQ0,
    StatusAddress::AdsQ1,
    StatusAddress::AdsQ2,
    StatusAddress::AdsQ3,
];

const OMEGA_ADDRS: [StatusAddress; 3] = [
    StatusAddress::AdsOmegaX,
    StatusAddress::AdsOmegaY,
    StatusAddress::AdsOmegaZ,
];

/// Thread-safe repository over the storage engine.
pub struct DataRepo<F: FlashInterface, M: FramInterface, C: Clock> {
    storage: Arc<Mutex<Storage<F, M>>>,
    clock: C,
    data_map: Arc<Vec<PayloadSchema>>,
}

impl<F: FlashInterface, M: FramInterface, C: Clock> Clone for DataRepo<F, M, C> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            clock: self.clock.clone(),
            data_map: Arc::clone(&self.data_map),
        }
    }
}

impl<F: FlashInterface, M: FramInterface, C: Clock> DataRepo<F, M, C> {
    /// Wrap an opened engine. Call [`DataRepo::init`] before use.
    pub fn new(storage: Storage<F, M>, clock: C, data_map: Vec<PayloadSchema>) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            clock,
            data_map: Arc::new(data_map),
        }
    }

    /// Initialize the status, payload and flight-plan tables.
    ///
    /// With `drop` every table is cleared and the status variables get
    /// their default values; otherwise persisted state survives.
    pub fn init(&self, drop: bool) -> Result<()> {
        if self.data_map.len() > MAX_PAYLOAD_COUNTERS {
            return Err(StorageError::Bounds);
        }
        for (payload, schema) in self.data_map.iter().enumerate() {
            if schema.sys_var != StatusAddress::payload_index(payload).ok_or(StorageError::Bounds)?
            {
                log_warn!("Payload {} uses a non-standard index variable", payload);
            }
        }

        {
            let mut storage = self.lock();
            let fp_entries = storage.config().fp_max_entries;
            storage.status_init(StatusAddress::COUNT, drop)?;
            if !self.data_map.is_empty() {
                storage.payload_init(&self.data_map, drop)?;
            }
            storage.flight_plan_init(fp_entries, drop)?;
        }

        if drop {
            for def in &STATUS_VAR_DEFS {
                self.set_status(def.address, def.default)?;
            }
        }
        Ok(())
    }

    /// Close the engine. Every later call fails with `NotOpen`.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Unwrap the engine again, e.g. to simulate a reset in tests.
    /// Fails when other repository handles are still alive.
    pub fn into_storage(self) -> Option<Storage<F, M>> {
        let DataRepo { storage, .. } = self;
        Arc::try_unwrap(storage)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    // A poisoned lock still guards an engine whose in-RAM state is
    // consistent with the persisted backup at every public-call
    // boundary, so the façade re-enters it.
    fn lock(&self) -> MutexGuard<'_, Storage<F, M>> {
        self.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- Status variables --

    pub fn get_status(&self, address: StatusAddress) -> Result<Value32> {
        self.lock().status_get(address.index())
    }

    pub fn set_status(&self, address: StatusAddress, value: Value32) -> Result<()> {
        self.lock().status_set(address.index(), value)
    }

    pub fn get_status_by_name(&self, name: &str) -> Result<Value32> {
        let def = var_by_name(name).ok_or(StorageError::NotFound)?;
        self.get_status(def.address)
    }

    pub fn set_status_by_name(&self, name: &str, value: Value32) -> Result<()> {
        let def = var_by_name(name).ok_or(StorageError::NotFound)?;
        self.set_status(def.address, value)
    }

    /// Attitude quaternion from the `ads_q*` variables.
    pub fn get_quaternion(&self) -> Result<Quaternion<f32>> {
        let mut q = [0.0f32; 4];
        for (value, address) in q.iter_mut().zip(QUAT_ADDRS) {
            *value = self.get_status(address)?.as_float();
        }
        Ok(Quaternion::new(q[3], q[0], q[1], q[2]))
    }

    /// Store the attitude quaternion into the `ads_q*` variables.
    pub fn set_quaternion(&self, q: &Quaternion<f32>) -> Result<()> {
        let values = [q.i, q.j, q.k, q.w];
        for (value, address) in values.iter().zip(QUAT_ADDRS) {
            self.set_status(address, Value32::from_float(*value))?;
        }
        Ok(())
    }

    /// Angular rate vector from the `ads_omega_*` variables.
    pub fn get_angular_rate(&self) -> Result<Vector3<f32>> {
        let mut r = [0.0f32; 3];
        for (value, address) in r.iter_mut().zip(OMEGA_ADDRS) {
            *value = self.get_status(address)?.as_float();
        }
        Ok(Vector3::new(r[0], r[1], r[2]))
    }

    /// Store the angular rate vector into the `ads_omega_*` variables.
    pub fn set_angular_rate(&self, rate: &Vector3<f32>) -> Result<()> {
        for (value, address) in rate.iter().zip(OMEGA_ADDRS) {
            self.set_status(address, Value32::from_float(*value))?;
        }
        Ok(())
    }

    // -- Flight plan --

    /// Schedule a command and bump `fpl_queue`.
    pub fn add_flight_plan(
        &self,
        timetodo: i32,
        cmd: &str,
        args: &str,
        executions: i32,
        periodical: i32,
        node: i32,
    ) -> Result<()> {
        if timetodo < 0 {
            return Err(StorageError::Bounds);
        }

        let entries = self.get_status(StatusAddress::FplQueue)?.as_int();
        let entry = FpEntry::new(timetodo, cmd, args, executions, periodical, node);
        let result = self.lock().flight_plan_set(&entry);
        match result {
            Ok(()) => {
                self.set_status(StatusAddress::FplQueue, Value32::from_int(entries + 1))?;
                Ok(())
            }
            Err(e) => {
                log_error!(
                    "Cannot put flight plan entry (time {}, entries {})",
                    timetodo,
                    entries
                );
                Err(e)
            }
        }
    }

    /// Read a due entry by time, consuming it: the entry is deleted and
    /// `fpl_queue` decremented. This is what the flight-plan task calls
    /// every second.
    pub fn pop_flight_plan(&self, unixtime: i32) -> Result<FpEntry> {
        let entries = self.get_status(StatusAddress::FplQueue)?.as_int();
        let result = {
            let mut storage = self.lock();
            storage.flight_plan_get(unixtime).and_then(|entry| {
                storage.flight_plan_delete(unixtime)?;
                Ok(entry)
            })
        };
        match result {
            Ok(entry) => {
                self.set_status(StatusAddress::FplQueue, Value32::from_int(entries - 1))?;
                Ok(entry)
            }
            Err(e) => {
                log_trace!("No flight plan entry at time {}", unixtime);
                Err(e)
            }
        }
    }

    /// Non-consuming lookup by time.
    pub fn get_flight_plan(&self, unixtime: i32) -> Result<FpEntry> {
        self.lock().flight_plan_get(unixtime)
    }

    /// Delete an entry by time and decrement `fpl_queue`.
    pub fn delete_flight_plan(&self, unixtime: i32) -> Result<()> {
        let entries = self.get_status(StatusAddress::FplQueue)?.as_int();
        self.lock().flight_plan_delete(unixtime)?;
        self.set_status(StatusAddress::FplQueue, Value32::from_int(entries - 1))
    }

    /// Erase the whole flight plan and zero `fpl_queue`.
    pub fn reset_flight_plan(&self) -> Result<()> {
        self.lock().flight_plan_reset()?;
        self.set_status(StatusAddress::FplQueue, Value32::ZERO)
    }

    /// Drop every entry whose time has passed, recount the live ones and
    /// store the count in `fpl_queue`. Returns the live count.
    pub fn purge_flight_plan(&self) -> Result<i32> {
        let time_min = self.clock.now_unix() as i32 + 1;
        let mut live = 0;
        {
            let mut storage = self.lock();
            let capacity = storage.flight_plan_capacity()?;
            for index in 0..capacity {
                match storage.flight_plan_get_idx(index) {
                    Ok(entry) if entry.unixtime > time_min => live += 1,
                    Ok(_) => storage.flight_plan_delete_idx(index)?,
                    Err(StorageError::NotFound) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        self.set_status(StatusAddress::FplQueue, Value32::from_int(live))?;
        Ok(live)
    }

    /// Write the live flight plan as a tab-separated table.
    pub fn show_flight_plan<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Time\tCommand\tArguments\tExecutions\tPeriodical\tNode")?;
        let mut storage = self.lock();
        let capacity = storage.flight_plan_capacity().unwrap_or(0);
        for index in 0..capacity {
            if let Ok(entry) = storage.flight_plan_get_idx(index) {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    entry.unixtime,
                    entry.cmd,
                    entry.args,
                    entry.executions,
                    entry.periodical,
                    entry.node
                )?;
            }
        }
        Ok(())
    }

    // -- Payload samples --

    /// Schema of one payload.
    pub fn schema(&self, payload: usize) -> Option<&PayloadSchema> {
        self.data_map.get(payload)
    }

    /// Append a sample at the payload's write index and bump the index.
    /// Returns the index the sample landed at.
    pub fn add_payload_sample(&self, payload: usize, data: &[u8]) -> Result<usize> {
        let schema = self.data_map.get(payload).ok_or(StorageError::Bounds)?;
        let index = self.get_status(schema.sys_var)?.as_int();
        if index < 0 {
            return Err(StorageError::Bounds);
        }

        let result = self
            .lock()
            .payload_set_data(payload, index as usize, data, schema);
        match result {
            Ok(()) => {
                self.set_status(schema.sys_var, Value32::from_int(index + 1))?;
                Ok(index as usize)
            }
            Err(e) => {
                log_error!(
                    "Couldn't store sample (payload {}, index {})",
                    payload,
                    index
                );
                Err(e)
            }
        }
    }

    /// Read the sample at `index`.
    pub fn get_payload_sample(&self, payload: usize, index: usize) -> Result<Vec<u8>> {
        let schema = self.data_map.get(payload).ok_or(StorageError::Bounds)?;
        let mut buf = vec![0u8; schema.size as usize];
        self.lock()
            .payload_get_data(payload, index, &mut buf, schema)?;
        Ok(buf)
    }

    /// Read the `offset`-th most recent sample (0 = latest).
    pub fn get_recent_payload_sample(&self, payload: usize, offset: usize) -> Result<Vec<u8>> {
        let schema = self.data_map.get(payload).ok_or(StorageError::Bounds)?;
        let index = self.get_status(schema.sys_var)?.as_int();
        let wanted = index as i64 - 1 - offset as i64;
        if wanted < 0 {
            log_error!(
                "Asked for too large offset ({}) on payload {}",
                offset,
                payload
            );
            return Err(StorageError::Bounds);
        }
        self.get_payload_sample(payload, wanted as usize)
    }

    /// Erase every payload and the flight plan, and zero the counters.
    pub fn reset_memory(&self) -> Result<()> {
        let (payload_rc, fp_rc) = {
            let mut storage = self.lock();
            (storage.payload_reset(), storage.flight_plan_reset())
        };

        for schema in self.data_map.iter() {
            self.set_status(schema.sys_var, Value32::ZERO)?;
        }
        self.set_status(StatusAddress::FplQueue, Value32::ZERO)?;

        payload_rc.and(fp_rc)
    }
}
