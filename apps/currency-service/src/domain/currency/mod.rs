//! Currency Types
//!
//! The closed set of supported currencies and the currency-pair request
//! types shared by the unary lookup and the subscription stream.
//!
//! # Validation
//!
//! Requests arrive as [`RawRateRequest`] (wire codes, unchecked). Decoding
//! into a [`RateRequest`] rejects codes outside the supported set;
//! [`RateRequest::ensure_distinct`] is the single same-currency rule used by
//! both the unary lookup and the subscription path.

use std::fmt;
use std::str::FromStr;

// =============================================================================
// Currency
// =============================================================================

/// A supported currency, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum Currency {
    /// Euro (reference currency).
    Eur = 0,
    /// US dollar.
    Usd = 1,
    /// Japanese yen.
    Jpy = 2,
    /// Bulgarian lev.
    Bgn = 3,
    /// Czech koruna.
    Czk = 4,
    /// Danish krone.
    Dkk = 5,
    /// Pound sterling.
    Gbp = 6,
    /// Hungarian forint.
    Huf = 7,
    /// Polish zloty.
    Pln = 8,
    /// Romanian leu.
    Ron = 9,
    /// Swedish krona.
    Sek = 10,
    /// Swiss franc.
    Chf = 11,
    /// Icelandic krona.
    Isk = 12,
    /// Norwegian krone.
    Nok = 13,
    /// Croatian kuna.
    Hrk = 14,
    /// Russian rouble.
    Rub = 15,
    /// Turkish lira.
    Try = 16,
    /// Australian dollar.
    Aud = 17,
    /// Brazilian real.
    Brl = 18,
    /// Canadian dollar.
    Cad = 19,
    /// Chinese yuan renminbi.
    Cny = 20,
    /// Hong Kong dollar.
    Hkd = 21,
    /// Indonesian rupiah.
    Idr = 22,
    /// Israeli shekel.
    Ils = 23,
    /// Indian rupee.
    Inr = 24,
    /// South Korean won.
    Krw = 25,
    /// Mexican peso.
    Mxn = 26,
    /// Malaysian ringgit.
    Myr = 27,
    /// New Zealand dollar.
    Nzd = 28,
    /// Philippine peso.
    Php = 29,
    /// Singapore dollar.
    Sgd = 30,
    /// Thai baht.
    Thb = 31,
    /// South African rand.
    Zar = 32,
}

impl Currency {
    /// The reference currency every rate table value is relative to.
    pub const REFERENCE: Self = Self::Eur;

    /// Get all supported currencies in wire order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Eur,
            Self::Usd,
            Self::Jpy,
            Self::Bgn,
            Self::Czk,
            Self::Dkk,
            Self::Gbp,
            Self::Huf,
            Self::Pln,
            Self::Ron,
            Self::Sek,
            Self::Chf,
            Self::Isk,
            Self::Nok,
            Self::Hrk,
            Self::Rub,
            Self::Try,
            Self::Aud,
            Self::Brl,
            Self::Cad,
            Self::Cny,
            Self::Hkd,
            Self::Idr,
            Self::Ils,
            Self::Inr,
            Self::Krw,
            Self::Mxn,
            Self::Myr,
            Self::Nzd,
            Self::Php,
            Self::Sgd,
            Self::Thb,
            Self::Zar,
        ]
    }

    /// Decode a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::Unsupported`] for codes outside the set.
    pub fn from_code(code: i32) -> Result<Self, CurrencyError> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::all().get(idx).copied())
            .ok_or(CurrencyError::Unsupported(code))
    }

    /// The wire code for this currency.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Jpy => "JPY",
            Self::Bgn => "BGN",
            Self::Czk => "CZK",
            Self::Dkk => "DKK",
            Self::Gbp => "GBP",
            Self::Huf => "HUF",
            Self::Pln => "PLN",
            Self::Ron => "RON",
            Self::Sek => "SEK",
            Self::Chf => "CHF",
            Self::Isk => "ISK",
            Self::Nok => "NOK",
            Self::Hrk => "HRK",
            Self::Rub => "RUB",
            Self::Try => "TRY",
            Self::Aud => "AUD",
            Self::Brl => "BRL",
            Self::Cad => "CAD",
            Self::Cny => "CNY",
            Self::Hkd => "HKD",
            Self::Idr => "IDR",
            Self::Ils => "ILS",
            Self::Inr => "INR",
            Self::Krw => "KRW",
            Self::Mxn => "MXN",
            Self::Myr => "MYR",
            Self::Nzd => "NZD",
            Self::Php => "PHP",
            Self::Sgd => "SGD",
            Self::Thb => "THB",
            Self::Zar => "ZAR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| CurrencyError::UnknownCode(s.to_string()))
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A rate request as received on the wire, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawRateRequest {
    /// Wire code of the base currency.
    pub base: i32,
    /// Wire code of the destination currency.
    pub destination: i32,
}

impl RawRateRequest {
    /// Create a raw request from wire codes.
    #[must_use]
    pub const fn new(base: i32, destination: i32) -> Self {
        Self { base, destination }
    }

    /// Decode both currency codes.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::Unsupported`] for the first code outside the set.
    pub fn decode(self) -> Result<RateRequest, CurrencyError> {
        Ok(RateRequest {
            base: Currency::from_code(self.base)?,
            destination: Currency::from_code(self.destination)?,
        })
    }
}

impl From<RateRequest> for RawRateRequest {
    fn from(request: RateRequest) -> Self {
        Self::new(request.base.code(), request.destination.code())
    }
}

/// A validated currency pair. Order matters: (EUR, USD) != (USD, EUR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateRequest {
    /// Base currency.
    pub base: Currency,
    /// Destination currency.
    pub destination: Currency,
}

impl RateRequest {
    /// Create a new pair.
    #[must_use]
    pub const fn new(base: Currency, destination: Currency) -> Self {
        Self { base, destination }
    }

    /// Reject pairs whose base equals the destination.
    ///
    /// # Errors
    ///
    /// Returns [`CurrencyError::SameCurrency`] when `base == destination`.
    pub fn ensure_distinct(&self) -> Result<(), CurrencyError> {
        if self.base == self.destination {
            return Err(CurrencyError::SameCurrency(self.base));
        }
        Ok(())
    }
}

impl fmt::Display for RateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.destination)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Invalid currency input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyError {
    /// Wire code outside the supported set.
    #[error("unsupported currency code {0}")]
    Unsupported(i32),

    /// ISO code string not recognised.
    #[error("unknown currency {0:?}")]
    UnknownCode(String),

    /// Base and destination are the same currency.
    #[error("base currency {0} cannot be the same as the destination currency {0}")]
    SameCurrency(Currency),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn wire_codes_match_position() {
        for (idx, currency) in Currency::all().iter().enumerate() {
            assert_eq!(currency.code(), i32::try_from(idx).unwrap());
            assert_eq!(Currency::from_code(currency.code()), Ok(*currency));
        }
        assert_eq!(Currency::all().len(), 33);
    }

    #[test_case(-1)]
    #[test_case(33)]
    #[test_case(i32::MAX)]
    fn from_code_rejects_unknown(code: i32) {
        assert_eq!(Currency::from_code(code), Err(CurrencyError::Unsupported(code)));
    }

    #[test_case("USD", Currency::Usd)]
    #[test_case("usd", Currency::Usd)]
    #[test_case(" gbp ", Currency::Gbp)]
    #[test_case("TRY", Currency::Try)]
    fn parses_iso_codes(input: &str, expected: Currency) {
        assert_eq!(input.parse::<Currency>(), Ok(expected));
    }

    #[test]
    fn parse_unknown_code_fails() {
        assert!(matches!(
            "XXX".parse::<Currency>(),
            Err(CurrencyError::UnknownCode(_))
        ));
    }

    #[test]
    fn display_uses_iso_code() {
        assert_eq!(Currency::Jpy.to_string(), "JPY");
        assert_eq!(
            RateRequest::new(Currency::Eur, Currency::Usd).to_string(),
            "EUR/USD"
        );
    }

    #[test]
    fn raw_request_decodes() {
        let raw = RawRateRequest::new(Currency::Gbp.code(), Currency::Jpy.code());
        assert_eq!(
            raw.decode(),
            Ok(RateRequest::new(Currency::Gbp, Currency::Jpy))
        );
    }

    #[test]
    fn raw_request_reports_first_bad_code() {
        assert_eq!(
            RawRateRequest::new(99, 100).decode(),
            Err(CurrencyError::Unsupported(99))
        );
        assert_eq!(
            RawRateRequest::new(0, 100).decode(),
            Err(CurrencyError::Unsupported(100))
        );
    }

    #[test]
    fn same_currency_rejected_for_every_code() {
        for currency in Currency::all() {
            let request = RateRequest::new(*currency, *currency);
            assert_eq!(
                request.ensure_distinct(),
                Err(CurrencyError::SameCurrency(*currency))
            );
        }
    }

    #[test]
    fn pair_order_matters() {
        let a = RateRequest::new(Currency::Eur, Currency::Usd);
        let b = RateRequest::new(Currency::Usd, Currency::Eur);
        assert_ne!(a, b);
        assert!(a.ensure_distinct().is_ok());
    }
}
