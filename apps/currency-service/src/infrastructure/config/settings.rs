//! Service Configuration Settings
//!
//! Configuration types for the currency service, loaded from environment
//! variables.
//!
//! Unparseable values fall back to the default. Parseable values outside
//! their valid range are a [`ConfigError`].

use std::time::Duration;

/// Default ECB daily reference rate feed.
pub const DEFAULT_ECB_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// Where the initial rate table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateSourceKind {
    /// European Central Bank daily XML feed.
    #[default]
    Ecb,
    /// Built-in reference table, no network access.
    Static,
}

impl RateSourceKind {
    /// Parse source kind from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "static" => Self::Static,
            _ => Self::Ecb,
        }
    }

    /// Get the source name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ecb => "ecb",
            Self::Static => "static",
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// gRPC server port.
    pub grpc_port: u16,
    /// Health check and metrics HTTP port.
    pub health_port: u16,
    /// Grace period for in-flight work on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_port: 9092,
            health_port: 8083,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Rate table refresh settings.
#[derive(Debug, Clone)]
pub struct RateSettings {
    /// Upstream feed for the rate table.
    pub source: RateSourceKind,
    /// URL of the ECB daily XML feed.
    pub ecb_url: String,
    /// Interval between refreshes.
    pub refresh_interval: Duration,
    /// Random-walk the cached table instead of refetching.
    pub simulate_fluctuation: bool,
    /// Maximum relative change per simulated refresh, in (0, 1).
    pub max_fluctuation: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            source: RateSourceKind::Ecb,
            ecb_url: DEFAULT_ECB_URL.to_string(),
            refresh_interval: Duration::from_millis(3000),
            simulate_fluctuation: true,
            max_fluctuation: 0.10,
        }
    }
}

/// Broker channel settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Capacity of each subscriber's outbound channel.
    pub subscriber_buffer: usize,
    /// Capacity of the rates-changed notification channel.
    pub notification_buffer: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            notification_buffer: 16,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Rate refresh settings.
    pub rates: RateSettings,
    /// Broker channel settings.
    pub broker: BrokerSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is outside its valid range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is outside its valid range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let server_defaults = ServerSettings::default();
        let server = ServerSettings {
            grpc_port: env.parse("CURRENCY_GRPC_PORT", server_defaults.grpc_port),
            health_port: env.parse("CURRENCY_HEALTH_PORT", server_defaults.health_port),
            shutdown_timeout: env.duration_secs(
                "CURRENCY_SHUTDOWN_TIMEOUT_SECS",
                server_defaults.shutdown_timeout,
            ),
        };

        let rate_defaults = RateSettings::default();
        let rates = RateSettings {
            source: env
                .get("CURRENCY_RATE_SOURCE")
                .map(|s| RateSourceKind::from_str_case_insensitive(&s))
                .unwrap_or_default(),
            ecb_url: env
                .get("CURRENCY_ECB_URL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(rate_defaults.ecb_url),
            refresh_interval: env.duration_millis(
                "CURRENCY_REFRESH_INTERVAL_MS",
                rate_defaults.refresh_interval,
            ),
            simulate_fluctuation: env.flag(
                "CURRENCY_SIMULATE_FLUCTUATION",
                rate_defaults.simulate_fluctuation,
            ),
            max_fluctuation: env.parse("CURRENCY_MAX_FLUCTUATION", rate_defaults.max_fluctuation),
        };

        let broker_defaults = BrokerSettings::default();
        let broker = BrokerSettings {
            subscriber_buffer: env.parse(
                "CURRENCY_SUBSCRIBER_BUFFER",
                broker_defaults.subscriber_buffer,
            ),
            notification_buffer: env.parse(
                "CURRENCY_NOTIFICATION_BUFFER",
                broker_defaults.notification_buffer,
            ),
        };

        let config = Self {
            server,
            rates,
            broker,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the first invalid variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fluctuation = self.rates.max_fluctuation;
        if !(fluctuation > 0.0 && fluctuation < 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "CURRENCY_MAX_FLUCTUATION",
                value: fluctuation.to_string(),
                expected: "a value in (0, 1)",
            });
        }
        if self.rates.refresh_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "CURRENCY_REFRESH_INTERVAL_MS",
                value: "0".to_string(),
                expected: "a positive interval",
            });
        }
        if self.broker.subscriber_buffer == 0 {
            return Err(ConfigError::OutOfRange {
                key: "CURRENCY_SUBSCRIBER_BUFFER",
                value: "0".to_string(),
                expected: "a positive capacity",
            });
        }
        if self.broker.notification_buffer == 0 {
            return Err(ConfigError::OutOfRange {
                key: "CURRENCY_NOTIFICATION_BUFFER",
                value: "0".to_string(),
                expected: "a positive capacity",
            });
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable parsed but is outside its valid range.
    #[error("environment variable {key}={value} is invalid, expected {expected}")]
    OutOfRange {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
        /// Accepted range.
        expected: &'static str,
    },
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}
