//! Statistics module
//!
//! Lock-free traffic statistics using atomic operations.

mod atomic;

pub use atomic::{GlobalStats, GlobalStatsSnapshot};
