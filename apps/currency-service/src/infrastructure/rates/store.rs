//! Rate Store
//!
//! Shared holder of the latest rate table.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::ports::RateSource;
use crate::domain::rates::{RateError, RateTable};

/// Shared store handle.
pub type SharedRateStore = Arc<RateStore>;

/// Latest rate table and refresh bookkeeping.
///
/// Empty until the first successful refresh. A failed refresh keeps the
/// previous table.
#[derive(Debug, Default)]
pub struct RateStore {
    table: RwLock<Option<Arc<RateTable>>>,
    refresh_count: AtomicU64,
    last_refreshed_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
}

impl RateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `table`.
    #[must_use]
    pub fn with_table(table: RateTable) -> Self {
        let store = Self::new();
        store.publish(table);
        store
    }

    /// Replace the current table.
    ///
    /// Returns the refresh sequence number, starting at 1.
    pub fn publish(&self, table: RateTable) -> u64 {
        *self.table.write() = Some(Arc::new(table));
        *self.last_refreshed_at.write() = Some(Utc::now());
        *self.last_error.write() = None;
        self.refresh_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a failed refresh without touching the table.
    pub fn record_failure(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// The current table, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<RateTable>> {
        self.table.read().clone()
    }

    /// Whether a table has been loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.table.read().is_some()
    }

    /// Number of successful refreshes.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    /// Time of the last successful refresh.
    #[must_use]
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed_at.read()
    }

    /// Error from the most recent refresh, cleared on success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Point-in-time status for the health endpoint.
    #[must_use]
    pub fn status(&self) -> RateStoreStatus {
        RateStoreStatus {
            ready: self.is_ready(),
            currencies: self.current().map_or(0, |t| t.len()),
            refresh_count: self.refresh_count(),
            last_refreshed_at: self.last_refreshed_at(),
            last_error: self.last_error(),
        }
    }
}

impl RateSource for RateStore {
    fn snapshot(&self) -> Result<Arc<RateTable>, RateError> {
        self.current().ok_or(RateError::Unavailable)
    }
}

/// Serializable store status.
#[derive(Debug, Clone, Serialize)]
pub struct RateStoreStatus {
    /// Whether a table is loaded.
    pub ready: bool,
    /// Currencies in the current table.
    pub currencies: usize,
    /// Successful refreshes so far.
    pub refresh_count: u64,
    /// Time of the last successful refresh.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Most recent refresh error.
    pub last_error: Option<String>,
}
