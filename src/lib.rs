//! nanosat-store - Persistent storage core for a nanosatellite flight
//! software stack
//!
//! This crate manages the three co-resident data collections an on-board
//! computer keeps on its non-volatile memories: a status table of 32-bit
//! system variables in FRAM (optionally triple-written for single-event
//! upset tolerance), a flash-backed flight plan of time-tagged deferred
//! commands indexed through a RAM translation look-aside buffer, and
//! append-only per-payload sample buffers with schema-described record
//! layouts.
//!
//! # Design Principles
//!
//! - **Trait-based media**: flash and FRAM are reached through the
//!   [`platform::traits`] interfaces; the in-memory mocks in
//!   [`platform::mock`] make the whole engine run identically on a host.
//! - **Owning engine value**: all persistent state hangs off a single
//!   [`storage::Storage`] created at open time; no process-wide tables.
//! - **Single-mutex façade**: consumers go through [`repo::DataRepo`],
//!   which serialises every storage call and maintains the derived
//!   counter variables.
//!
//! # Modules
//!
//! - [`core`]: logging macros and the wall-clock abstraction
//! - [`platform`]: media error types, interfaces and mock backends
//! - [`storage`]: the storage engine (status / flight plan / payload)
//! - [`repo`]: thread-safe data repository façade

pub mod core;
pub mod platform;
pub mod repo;
pub mod storage;

pub use platform::mock::{MockFlash, MockFram};
pub use platform::traits::{FlashInterface, FramInterface};
pub use repo::{DataRepo, StatusAddress};
pub use storage::{
    FpEntry, PayloadSchema, Storage, StorageConfig, StorageError, TlbLocation, Value32,
};
