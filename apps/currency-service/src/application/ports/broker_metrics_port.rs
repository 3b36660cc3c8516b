//! Broker Metrics Port
//!
//! Observability hooks the broker calls into. The infrastructure layer
//! supplies the Prometheus-backed implementation.

use std::time::Duration;

use crate::domain::streaming::RejectionCode;
use crate::domain::subscription::RegistryStats;

/// Receives broker events for metrics export.
#[cfg_attr(test, mockall::automock)]
pub trait BrokerMetrics: Send + Sync {
    /// A subscription request was rejected in-band.
    fn subscription_rejected(&self, code: RejectionCode);

    /// The registry changed size.
    fn subscriptions_changed(&self, stats: RegistryStats);

    /// A broadcast cycle finished with `delivered` sent and `dropped` lost to
    /// full buffers.
    fn cycle_completed(&self, delivered: usize, dropped: usize, elapsed: Duration);

    /// A broadcast cycle was skipped because no rate table was available.
    fn cycle_skipped(&self, elapsed: Duration);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBrokerMetrics;

impl BrokerMetrics for NoopBrokerMetrics {
    fn subscription_rejected(&self, _code: RejectionCode) {}

    fn subscriptions_changed(&self, _stats: RegistryStats) {}

    fn cycle_completed(&self, _delivered: usize, _dropped: usize, _elapsed: Duration) {}

    fn cycle_skipped(&self, _elapsed: Duration) {}
}
