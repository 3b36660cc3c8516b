//! Domain Layer - Core currency types and business rules.
//!
//! This layer contains the currency set, the rate table with its cross-rate
//! formula, the messages pushed on a subscription stream, and the
//! subscription registry. Nothing here depends on the runtime or transport.

/// Supported currencies and currency-pair requests.
pub mod currency;

/// Rate table and cross-rate computation.
pub mod rates;

/// Messages delivered on a subscription stream.
pub mod streaming;

/// Subscription tracking per connection.
pub mod subscription;
