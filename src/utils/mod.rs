//! Shared utilities
//!
//! - [`fs`] - Atomic writes and binary sniffing
//! - [`throttle`] - Bounded-parallelism permit pool for import I/O

pub mod fs;
pub mod throttle;

pub use fs::{atomic_write, ensure_dir, looks_binary};
pub use throttle::Throttle;
