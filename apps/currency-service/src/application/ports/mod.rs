//! Port Interfaces
//!
//! Contracts between the application services and the infrastructure
//! adapters that supply rate data.
//!
//! ## Driven Ports (Outbound)
//!
//! - `RateSource`: Read access to the current rate table
//! - `RateFetcher`: Loads a fresh rate table from an upstream feed
//! - `BrokerMetrics`: Receives broker events for metrics export

mod broker_metrics_port;
mod rate_fetcher_port;
mod rate_source_port;

#[cfg(test)]
pub use broker_metrics_port::MockBrokerMetrics;
pub use broker_metrics_port::{BrokerMetrics, NoopBrokerMetrics};
pub use rate_fetcher_port::{FetchError, RateFetcher};
#[cfg(test)]
pub use rate_source_port::MockRateSource;
pub use rate_source_port::RateSource;
