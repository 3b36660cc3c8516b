//! Static Reference Rates
//!
//! A built-in EUR-relative table for running without network access.
//! HRK and RUB are not published and have no value.

use async_trait::async_trait;

use crate::application::ports::{FetchError, RateFetcher};
use crate::domain::currency::Currency;
use crate::domain::rates::RateTable;

/// The built-in reference table.
#[must_use]
pub fn reference_table() -> RateTable {
    RateTable::from_values([
        (Currency::Usd, 1.0823),
        (Currency::Jpy, 161.92),
        (Currency::Bgn, 1.9558),
        (Currency::Czk, 25.213),
        (Currency::Dkk, 7.4585),
        (Currency::Gbp, 0.8453),
        (Currency::Huf, 395.10),
        (Currency::Pln, 4.3178),
        (Currency::Ron, 4.9762),
        (Currency::Sek, 11.351),
        (Currency::Chf, 0.9613),
        (Currency::Isk, 149.90),
        (Currency::Nok, 11.742),
        (Currency::Try, 35.215),
        (Currency::Aud, 1.6283),
        (Currency::Brl, 5.9066),
        (Currency::Cad, 1.4811),
        (Currency::Cny, 7.8692),
        (Currency::Hkd, 8.4513),
        (Currency::Idr, 17_695.0),
        (Currency::Ils, 4.0572),
        (Currency::Inr, 90.391),
        (Currency::Krw, 1492.8),
        (Currency::Mxn, 19.852),
        (Currency::Myr, 5.0987),
        (Currency::Nzd, 1.7882),
        (Currency::Php, 63.361),
        (Currency::Sgd, 1.4589),
        (Currency::Thb, 39.052),
        (Currency::Zar, 20.194),
    ])
}

/// Serves [`reference_table`] on every fetch.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    table: RateTable,
}

impl StaticFetcher {
    /// Fetcher over the built-in reference table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(reference_table())
    }

    /// Fetcher over a caller-supplied table.
    #[must_use]
    pub const fn with_table(table: RateTable) -> Self {
        Self { table }
    }
}

impl Default for StaticFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateFetcher for StaticFetcher {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> Result<RateTable, FetchError> {
        Ok(self.table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_covers_published_currencies() {
        let table = reference_table();

        for currency in Currency::all() {
            let expected = !matches!(currency, Currency::Hrk | Currency::Rub);
            assert_eq!(table.contains(*currency), expected, "{currency}");
        }
        assert_eq!(table.value(Currency::Eur), Some(1.0));
    }

    #[tokio::test]
    async fn fetch_returns_table() {
        let fetcher = StaticFetcher::new();

        let table = fetcher.fetch().await.unwrap();

        assert_eq!(table, reference_table());
        assert_eq!(fetcher.name(), "static");
    }
}
