//! Timing module
//!
//! Stochastic inter-request delays and cancellable sleeping.

mod model;

pub use model::{
    sleep_cancellable, TimingModel, LONG_PAUSE_FACTOR, P_LONG_PAUSE, P_QUICK_SCAN,
    QUICK_SCAN_FACTOR, SLEEP_SLICE,
};
