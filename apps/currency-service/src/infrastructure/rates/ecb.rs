//! ECB Reference Rate Fetcher
//!
//! Loads the European Central Bank daily reference rates. The feed is an XML
//! document whose innermost `Cube` elements carry `currency` and `rate`
//! attributes, all relative to EUR:
//!
//! ```xml
//! <Cube time='2024-05-17'>
//!   <Cube currency='USD' rate='1.0866'/>
//!   <Cube currency='JPY' rate='169.21'/>
//! </Cube>
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::application::ports::{FetchError, RateFetcher};
use crate::domain::currency::Currency;
use crate::domain::rates::RateTable;

#[allow(clippy::expect_used)]
static CUBE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"currency\s*=\s*['"]([A-Za-z]{3})['"]\s+rate\s*=\s*['"]([^'"]*)['"]"#)
        .expect("cube pattern is valid")
});

/// Extract a rate table from an ECB daily XML document.
///
/// Currencies outside the supported set are ignored. EUR is always 1.0.
///
/// # Errors
///
/// - [`FetchError::Malformed`] if a rate attribute is not a number
/// - [`FetchError::Empty`] if no supported currency is present
pub fn parse_ecb_rates(body: &str) -> Result<RateTable, FetchError> {
    let mut values = Vec::new();

    for captures in CUBE_PATTERN.captures_iter(body) {
        let code = &captures[1];
        let raw_rate = &captures[2];

        let rate: f64 = raw_rate.trim().parse().map_err(|_| {
            FetchError::Malformed(format!("rate {raw_rate:?} for {code} is not a number"))
        })?;

        match code.parse::<Currency>() {
            Ok(currency) => values.push((currency, rate)),
            Err(_) => tracing::debug!(currency = code, "Ignoring unsupported currency from ECB feed"),
        }
    }

    if values.is_empty() {
        return Err(FetchError::Empty);
    }

    Ok(RateTable::from_values(values))
}

/// Fetches the ECB daily XML feed over HTTP.
#[derive(Debug, Clone)]
pub struct EcbFetcher {
    client: reqwest::Client,
    url: String,
}

impl EcbFetcher {
    /// Create a fetcher for `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("currency-service/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The feed URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateFetcher for EcbFetcher {
    fn name(&self) -> &'static str {
        "ecb"
    }

    async fn fetch(&self) -> Result<RateTable, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Http(format!(
                "expected status 200 from {}, got {}",
                self.url,
                response.status().as_u16()
            )));
        }

        let body = response.text().await?;
        let table = parse_ecb_rates(&body)?;
        tracing::debug!(url = %self.url, currencies = table.len(), "Fetched ECB reference rates");
        Ok(table)
    }
}
