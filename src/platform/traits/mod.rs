//! Media interface traits
//!
//! This module defines the traits that media backends must provide.

pub mod flash;
pub mod fram;

pub use flash::FlashInterface;
pub use fram::FramInterface;
