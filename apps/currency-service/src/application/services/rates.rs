//! Unary Rate Service
//!
//! Stateless lookup of a single exchange rate over the current rate table.

use std::sync::Arc;

use crate::application::ports::RateSource;
use crate::domain::currency::{Currency, CurrencyError, RawRateRequest};
use crate::domain::rates::{RateError, RateQuote};

/// Errors from a unary rate lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLookupError {
    /// Unsupported currency code or base equal to destination.
    #[error("invalid rate request base={} destination={}: {source}", request.base, request.destination)]
    InvalidArgument {
        /// The request as received.
        request: RawRateRequest,
        /// Field that failed validation.
        field: &'static str,
        /// Underlying validation error.
        source: CurrencyError,
    },

    /// No rate table has been loaded yet.
    #[error("rate table unavailable")]
    Unavailable,

    /// Currency has no value in the current table.
    #[error("rate not found for currency {0}")]
    NotFound(Currency),
}

impl RateLookupError {
    /// Label used in metrics.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Unavailable => "unavailable",
            Self::NotFound(_) => "not_found",
        }
    }

    fn invalid(request: RawRateRequest, source: CurrencyError) -> Self {
        let field = match source {
            CurrencyError::Unsupported(code) if code == request.base => "base",
            _ => "destination",
        };
        Self::InvalidArgument {
            request,
            field,
            source,
        }
    }
}

impl From<RateError> for RateLookupError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::NotFound(currency) => Self::NotFound(currency),
            RateError::Unavailable => Self::Unavailable,
        }
    }
}

/// One-shot rate lookups sharing the broker's validation and formula.
#[derive(Clone)]
pub struct RateService {
    source: Arc<dyn RateSource>,
}

impl RateService {
    /// Create a service over a rate source.
    #[must_use]
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    /// Compute `table[base] / table[destination]`.
    ///
    /// # Errors
    ///
    /// - [`RateLookupError::InvalidArgument`] for unsupported codes or equal currencies
    /// - [`RateLookupError::Unavailable`] before the first table is loaded
    /// - [`RateLookupError::NotFound`] when either currency is missing from the table
    pub fn get_rate(&self, request: RawRateRequest) -> Result<RateQuote, RateLookupError> {
        let pair = request
            .decode()
            .map_err(|e| RateLookupError::invalid(request, e))?;
        pair.ensure_distinct()
            .map_err(|e| RateLookupError::invalid(request, e))?;

        let table = self.source.snapshot()?;
        Ok(table.quote(pair)?)
    }
}

impl std::fmt::Debug for RateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateService").finish_non_exhaustive()
    }
}
