#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Alarm subsystem: scheduled trigger storage and the one-shot expiry monitor.

/// Alarm records and the mutex-guarded store.
#[path = "../store.rs"]
pub mod store;

/// Background polling loop raising one alert per expired alarm.
#[path = "../monitor.rs"]
pub mod monitor;

pub use monitor::AlarmMonitor;
pub use store::{Alarm, AlarmError, AlarmId, AlarmStore};
