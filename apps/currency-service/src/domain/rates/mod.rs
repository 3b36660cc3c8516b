//! Rate Table
//!
//! Currency values relative to the reference currency and the cross-rate
//! formula `rate(base, destination) = table[base] / table[destination]`.

use std::collections::HashMap;

use rand::Rng;

use super::currency::{Currency, RateRequest};

/// Point-in-time currency values relative to [`Currency::REFERENCE`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RateTable {
    values: HashMap<Currency, f64>,
}

impl RateTable {
    /// Build a table from `(currency, value)` pairs.
    ///
    /// Non-finite and non-positive values are dropped, so every rate derived
    /// from the table is strictly positive. The reference currency is always
    /// present with value 1.0.
    pub fn from_values(values: impl IntoIterator<Item = (Currency, f64)>) -> Self {
        let mut values: HashMap<_, _> = values
            .into_iter()
            .filter(|(_, v)| v.is_finite() && *v > 0.0)
            .collect();
        values.insert(Currency::REFERENCE, 1.0);
        Self { values }
    }

    /// Value of a currency relative to the reference.
    #[must_use]
    pub fn value(&self, currency: Currency) -> Option<f64> {
        self.values.get(&currency).copied()
    }

    /// Whether the table has a value for `currency`.
    #[must_use]
    pub fn contains(&self, currency: Currency) -> bool {
        self.values.contains_key(&currency)
    }

    /// Number of currencies in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(currency, value)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (Currency, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }

    /// Cross rate between two currencies.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::NotFound`] when either currency is missing.
    pub fn cross_rate(&self, base: Currency, destination: Currency) -> Result<f64, RateError> {
        let base_value = self.value(base).ok_or(RateError::NotFound(base))?;
        let destination_value = self
            .value(destination)
            .ok_or(RateError::NotFound(destination))?;
        Ok(base_value / destination_value)
    }

    /// Quote a request against this table.
    ///
    /// # Errors
    ///
    /// Returns [`RateError::NotFound`] when either currency is missing.
    pub fn quote(&self, request: RateRequest) -> Result<RateQuote, RateError> {
        Ok(RateQuote {
            base: request.base,
            destination: request.destination,
            rate: self.cross_rate(request.base, request.destination)?,
        })
    }

    /// Random walk: every non-reference value is multiplied by a factor
    /// drawn uniformly from `[1 - max_change, 1 + max_change]`.
    ///
    /// `max_change` must lie in `(0, 1)` so values stay strictly positive.
    #[must_use]
    pub fn fluctuated<R: Rng>(&self, rng: &mut R, max_change: f64) -> Self {
        let values = self
            .values
            .iter()
            .map(|(currency, value)| {
                if *currency == Currency::REFERENCE {
                    (*currency, *value)
                } else {
                    let factor = 1.0 + rng.random_range(-max_change..=max_change);
                    (*currency, value * factor)
                }
            })
            .collect();
        Self { values }
    }
}

/// A computed exchange rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateQuote {
    /// Base currency.
    pub base: Currency,
    /// Destination currency.
    pub destination: Currency,
    /// Units of destination per unit of base.
    pub rate: f64,
}

/// Rate lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    /// Currency has no value in the current table.
    #[error("rate not found for currency {0}")]
    NotFound(Currency),

    /// No rate table has been loaded yet.
    #[error("rate table unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn sample_table() -> RateTable {
        RateTable::from_values([
            (Currency::Usd, 1.08),
            (Currency::Gbp, 0.85),
            (Currency::Jpy, 161.2),
        ])
    }

    #[test]
    fn reference_is_always_one() {
        let table = RateTable::from_values([(Currency::Eur, 3.0)]);
        assert_eq!(table.value(Currency::Eur), Some(1.0));
        assert_eq!(RateTable::from_values([]).len(), 1);
    }

    #[test]
    fn invalid_values_are_dropped() {
        let table = RateTable::from_values([
            (Currency::Usd, 0.0),
            (Currency::Gbp, -1.0),
            (Currency::Jpy, f64::NAN),
            (Currency::Chf, f64::INFINITY),
            (Currency::Sek, 11.2),
        ]);
        assert!(!table.contains(Currency::Usd));
        assert!(!table.contains(Currency::Gbp));
        assert!(!table.contains(Currency::Jpy));
        assert!(!table.contains(Currency::Chf));
        assert!(table.contains(Currency::Sek));
    }

    #[test]
    fn cross_rate_divides_values() {
        let table = sample_table();
        assert_eq!(
            table.cross_rate(Currency::Usd, Currency::Gbp),
            Ok(1.08 / 0.85)
        );
        assert_eq!(table.cross_rate(Currency::Eur, Currency::Usd), Ok(1.0 / 1.08));
    }

    #[test]
    fn cross_rate_missing_currency() {
        let table = sample_table();
        assert_eq!(
            table.cross_rate(Currency::Rub, Currency::Usd),
            Err(RateError::NotFound(Currency::Rub))
        );
        assert_eq!(
            table.cross_rate(Currency::Usd, Currency::Hrk),
            Err(RateError::NotFound(Currency::Hrk))
        );
    }

    #[test]
    fn quote_carries_pair() {
        let quote = sample_table()
            .quote(RateRequest::new(Currency::Gbp, Currency::Jpy))
            .unwrap();
        assert_eq!(quote.base, Currency::Gbp);
        assert_eq!(quote.destination, Currency::Jpy);
        assert_eq!(quote.rate, 0.85 / 161.2);
    }

    #[test]
    fn fluctuation_stays_within_bounds() {
        let table = sample_table();
        let mut rng = StdRng::seed_from_u64(7);
        let mut current = table.clone();

        for _ in 0..100 {
            let next = current.fluctuated(&mut rng, 0.1);
            for (currency, value) in current.iter() {
                let new_value = next.value(currency).unwrap();
                assert!(new_value > 0.0);
                assert!(new_value >= value * 0.9 - 1e-9);
                assert!(new_value <= value * 1.1 + 1e-9);
            }
            assert_eq!(next.value(Currency::Eur), Some(1.0));
            assert_eq!(next.len(), current.len());
            current = next;
        }
    }

    proptest! {
        #[test]
        fn cross_rate_is_exact_quotient(
            base_idx in 1usize..33,
            dest_idx in 1usize..33,
            base_value in 0.0001f64..10_000.0,
            dest_value in 0.0001f64..10_000.0,
        ) {
            let base = Currency::all()[base_idx];
            let destination = Currency::all()[dest_idx];
            prop_assume!(base != destination);

            let table = RateTable::from_values([(base, base_value), (destination, dest_value)]);
            let rate = table.cross_rate(base, destination).unwrap();

            prop_assert_eq!(rate, base_value / dest_value);
            prop_assert!(rate > 0.0);
        }
    }
}
