//! Core support systems
//!
//! Logging macros and the wall-clock abstraction used at the boundary to
//! the OS layer.

pub mod logging;
pub mod time;

pub use time::{Clock, MockClock, SystemClock};
