//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for rate data (rate source, upstream fetcher).
pub mod ports;

/// Application services: unary rate lookups and the subscription broker.
pub mod services;
