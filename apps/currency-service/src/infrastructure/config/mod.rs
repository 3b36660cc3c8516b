//! Configuration Module
//!
//! Configuration loading for the currency service.

mod settings;

pub use settings::{
    BrokerSettings, ConfigError, DEFAULT_ECB_URL, RateSettings, RateSourceKind, ServerSettings,
    ServiceConfig,
};
