//! Rate Monitor
//!
//! Refreshes the [`RateStore`] on a fixed interval and notifies the broker
//! after every successful refresh.
//!
//! Each tick:
//! - empty store: fetch from the upstream feed
//! - simulation enabled: random-walk the current table
//! - simulation disabled: fetch again
//!
//! Failures are recorded on the store and never stop the monitor.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::store::RateStore;
use crate::application::ports::{FetchError, RateFetcher};
use crate::application::services::RatesChanged;
use crate::infrastructure::config::RateSettings;
use crate::infrastructure::metrics::{self, RefreshLabel};

/// Refresh timing and simulation settings.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    /// Interval between refreshes.
    pub refresh_interval: Duration,
    /// Random-walk the cached table instead of refetching.
    pub simulate_fluctuation: bool,
    /// Maximum relative change per simulated refresh.
    pub max_fluctuation: f64,
}

impl From<&RateSettings> for MonitorSettings {
    fn from(settings: &RateSettings) -> Self {
        Self {
            refresh_interval: settings.refresh_interval,
            simulate_fluctuation: settings.simulate_fluctuation,
            max_fluctuation: settings.max_fluctuation,
        }
    }
}

/// Timer-driven rate table refresher.
pub struct RateMonitor {
    store: Arc<RateStore>,
    fetcher: Arc<dyn RateFetcher>,
    settings: MonitorSettings,
    notifications: mpsc::Sender<RatesChanged>,
}

impl RateMonitor {
    /// Create a monitor.
    #[must_use]
    pub fn new(
        store: Arc<RateStore>,
        fetcher: Arc<dyn RateFetcher>,
        settings: MonitorSettings,
        notifications: mpsc::Sender<RatesChanged>,
    ) -> Self {
        Self {
            store,
            fetcher,
            settings,
            notifications,
        }
    }

    /// Perform one refresh and publish the result.
    ///
    /// Returns the published sequence number and how the table was produced.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the store keeps its previous table.
    pub async fn refresh(&self, rng: &mut StdRng) -> Result<(u64, RefreshLabel), FetchError> {
        let current = self.store.current();

        let (table, label) = match current {
            Some(table) if self.settings.simulate_fluctuation => (
                table.fluctuated(rng, self.settings.max_fluctuation),
                RefreshLabel::Simulated,
            ),
            _ => (self.fetcher.fetch().await?, RefreshLabel::Fetched),
        };

        Ok((self.store.publish(table), label))
    }

    /// Refresh once, record the outcome and notify on success.
    pub async fn tick(&self, rng: &mut StdRng) {
        match self.refresh(rng).await {
            Ok((sequence, label)) => {
                metrics::record_refresh(label);
                tracing::debug!(sequence, source = self.fetcher.name(), "Rate table refreshed");
                self.notify(RatesChanged { sequence });
            }
            Err(e) => {
                metrics::record_refresh(RefreshLabel::Failed);
                tracing::warn!(source = self.fetcher.name(), error = %e, "Rate refresh failed");
                self.store.record_failure(e.to_string());
            }
        }
    }

    fn notify(&self, changed: RatesChanged) {
        match self.notifications.try_send(changed) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Pending notifications already trigger a cycle on the latest table.
                tracing::debug!(sequence = changed.sequence, "Broker busy, coalescing notification");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(sequence = changed.sequence, "Broker gone, notification dropped");
            }
        }
    }

    /// Seed the store, then refresh on every interval until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut rng = StdRng::from_os_rng();
        tracing::info!(
            source = self.fetcher.name(),
            interval_ms = u64::try_from(self.settings.refresh_interval.as_millis()).unwrap_or(u64::MAX),
            simulate = self.settings.simulate_fluctuation,
            "Rate monitor started"
        );

        let mut interval = tokio::time::interval(self.settings.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Rate monitor shutting down");
                    break;
                }
                _ = interval.tick() => self.tick(&mut rng).await,
            }
        }
    }
}

impl std::fmt::Debug for RateMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateMonitor")
            .field("source", &self.fetcher.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
