//! Rate Fetcher Port (Driven Port)
//!
//! Interface for loading a complete rate table from an upstream feed.

use async_trait::async_trait;

use crate::domain::rates::RateTable;

/// Errors from loading a rate table.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed or returned a non-success status.
    #[error("rate feed request failed: {0}")]
    Http(String),

    /// Response body could not be interpreted.
    #[error("rate feed returned malformed data: {0}")]
    Malformed(String),

    /// Response contained no usable rates.
    #[error("rate feed returned no rates")]
    Empty,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Port for fetching rate tables.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    /// Short name of the feed for logs and metrics.
    fn name(&self) -> &'static str;

    /// Load a fresh table.
    ///
    /// # Errors
    ///
    /// Returns error if the feed cannot be reached or yields no rates.
    async fn fetch(&self) -> Result<RateTable, FetchError>;
}
