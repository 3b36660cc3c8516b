//! Rate Table Adapters
//!
//! Holds the current rate table, loads it from an upstream feed and keeps
//! it moving on a timer.
//!
//! - [`RateStore`]: Latest table plus refresh bookkeeping
//! - [`RateMonitor`]: Timer-driven refresher that emits `RatesChanged`
//! - [`EcbFetcher`]: ECB daily reference rates over HTTP
//! - [`StaticFetcher`]: Built-in reference table

mod ecb;
mod fixed;
mod monitor;
mod store;

pub use ecb::{EcbFetcher, parse_ecb_rates};
pub use fixed::{StaticFetcher, reference_table};
pub use monitor::{MonitorSettings, RateMonitor};
pub use store::{RateStore, RateStoreStatus, SharedRateStore};
