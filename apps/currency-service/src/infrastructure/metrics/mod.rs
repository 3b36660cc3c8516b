//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Broker**: Updates delivered and dropped, rejected subscriptions,
//!   broadcast cycle outcomes and durations
//! - **Subscriptions**: Active connection and pair counts
//! - **Rates**: Table refresh outcomes and unary lookups
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::ports::BrokerMetrics;
use crate::domain::streaming::RejectionCode;
use crate::domain::subscription::RegistryStats;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Delivery counters
    describe_counter!(
        "currency_broker_updates_sent_total",
        "Total rate updates delivered to subscribers"
    );
    describe_counter!(
        "currency_broker_updates_dropped_total",
        "Total rate updates dropped because a subscriber buffer was full"
    );
    describe_counter!(
        "currency_broker_subscription_errors_total",
        "Total subscription requests rejected in-band by code"
    );

    // Broadcast cycles
    describe_counter!(
        "currency_broker_broadcast_cycles_total",
        "Total broadcast cycles by outcome"
    );
    describe_histogram!(
        "currency_broker_broadcast_cycle_seconds",
        "Time to compute and deliver one broadcast cycle"
    );

    // Subscription gauges
    describe_gauge!(
        "currency_broker_connections",
        "Number of subscribed connections"
    );
    describe_gauge!(
        "currency_broker_subscriptions",
        "Number of active (connection, pair) subscriptions"
    );

    // Rates
    describe_counter!(
        "currency_rates_refresh_total",
        "Total rate table refreshes by outcome"
    );
    describe_counter!(
        "currency_rate_lookups_total",
        "Total unary rate lookups by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for a broadcast cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleLabel {
    /// Updates were computed and delivered.
    Completed,
    /// No rate table was available.
    Skipped,
}

impl CycleLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome label for a rate table refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshLabel {
    /// A table was fetched from the upstream feed.
    Fetched,
    /// The current table was randomly walked.
    Simulated,
    /// The refresh failed.
    Failed,
}

impl RefreshLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Simulated => "simulated",
            Self::Failed => "failed",
        }
    }
}

/// Record rate updates delivered by one broadcast cycle.
pub fn record_updates_sent(count: u64) {
    counter!("currency_broker_updates_sent_total").increment(count);
}

/// Record rate updates dropped due to full subscriber buffers.
pub fn record_updates_dropped(count: u64) {
    counter!("currency_broker_updates_dropped_total").increment(count);
}

/// Record a subscription request rejected in-band.
pub fn record_subscription_error(code: RejectionCode) {
    counter!(
        "currency_broker_subscription_errors_total",
        "code" => code.as_str()
    )
    .increment(1);
}

/// Record the end of a broadcast cycle.
pub fn record_broadcast_cycle(outcome: CycleLabel, duration: Duration) {
    counter!(
        "currency_broker_broadcast_cycles_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!("currency_broker_broadcast_cycle_seconds").record(duration.as_secs_f64());
}

/// Update the subscription gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(connections: usize, subscriptions: usize) {
    gauge!("currency_broker_connections").set(connections as f64);
    gauge!("currency_broker_subscriptions").set(subscriptions as f64);
}

/// Record a rate table refresh.
pub fn record_refresh(outcome: RefreshLabel) {
    counter!(
        "currency_rates_refresh_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a unary rate lookup.
pub fn record_rate_lookup(outcome: &'static str) {
    counter!(
        "currency_rate_lookups_total",
        "outcome" => outcome
    )
    .increment(1);
}

// =============================================================================
// Broker Adapter
// =============================================================================

/// [`BrokerMetrics`] backed by the global Prometheus recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusBrokerMetrics;

impl BrokerMetrics for PrometheusBrokerMetrics {
    fn subscription_rejected(&self, code: RejectionCode) {
        record_subscription_error(code);
    }

    fn subscriptions_changed(&self, stats: RegistryStats) {
        set_subscriptions(stats.connection_count, stats.subscription_count);
    }

    fn cycle_completed(&self, delivered: usize, dropped: usize, elapsed: Duration) {
        record_updates_sent(u64::try_from(delivered).unwrap_or(u64::MAX));
        record_updates_dropped(u64::try_from(dropped).unwrap_or(u64::MAX));
        record_broadcast_cycle(CycleLabel::Completed, elapsed);
    }

    fn cycle_skipped(&self, elapsed: Duration) {
        record_broadcast_cycle(CycleLabel::Skipped, elapsed);
    }
}

// =============================================================================
// Tests
// =============================================================================
