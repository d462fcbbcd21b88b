//! Utility modules

pub mod memory_storage;
pub mod time;

pub use memory_storage::*;
pub use time::*;
