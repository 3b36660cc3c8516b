//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `RateService`: One-shot rate lookups
//! - `RateBroker`: Subscription protocol and rate fan-out

mod broker;
mod rates;

pub use broker::{
    CycleOutcome, CycleReport, RateBroker, RatesChanged, SharedRateBroker, SubscriberHandle,
    new_connection_id,
};
pub use rates::{RateLookupError, RateService};
