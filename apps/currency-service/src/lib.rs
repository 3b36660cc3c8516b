#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Currency Service - Exchange Rate Lookups and Subscriptions
//!
//! A gRPC service that answers one-shot exchange rate lookups and pushes
//! rate updates to clients subscribed over a bidirectional stream. Rates
//! are EUR-relative reference rates fetched from the ECB daily feed (or a
//! built-in table) and optionally random-walked between fetches.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core currency logic and data types
//!   - `currency`: Supported currencies and pair requests
//!   - `rates`: Rate table and cross-rate formula
//!   - `streaming`: Messages delivered to subscribers
//!   - `subscription`: Per-connection subscription registry
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Rate source and upstream fetcher interfaces
//!   - `services`: Unary rate lookups and the subscription broker
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `rates`: Rate store, ECB and static fetchers, refresh monitor
//!   - `grpc`: gRPC server implementation
//!   - `config`: Configuration from the environment
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!  ECB feed в”Җв”Җв–ә RateMonitor в”Җв”Җв–ә RateStore в—„в”Җв”Җ GetRate в—„в”Җв”Җ Client
//!                   в”Ӯ               в”Ӯ
//!             RatesChanged          в”Ӯ snapshot
//!                   в–ј               в–ј
//!               RateBroker в”Җв”Җв”Җв”Җв”Җв”Җв–ә subscriber channels в”Җв”Җв–ә Client 1..N
//!                   в–І
//!        SubscribeRates requests
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core currency types with no runtime dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::currency::{Currency, CurrencyError, RateRequest, RawRateRequest};
pub use domain::rates::{RateError, RateQuote, RateTable};
pub use domain::streaming::{RejectionCode, StreamMessage, SubscriptionRejection};
pub use domain::subscription::{
    AddOutcome, ConnectionId, RegistryError, RegistryStats, SubscriptionRegistry,
};

// Application services
pub use application::ports::{
    BrokerMetrics, FetchError, NoopBrokerMetrics, RateFetcher, RateSource,
};
pub use application::services::{
    CycleOutcome, CycleReport, RateBroker, RateLookupError, RateService, RatesChanged,
    SharedRateBroker, SubscriberHandle,
};

// Infrastructure config
pub use infrastructure::config::{
    BrokerSettings, ConfigError, RateSettings, RateSourceKind, ServerSettings, ServiceConfig,
};

// Rate storage and refresh
pub use infrastructure::rates::{
    EcbFetcher, MonitorSettings, RateMonitor, RateStore, SharedRateStore, StaticFetcher,
    reference_table,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    proto::currency::v1 as proto,
    server::{CurrencyGrpcServer, CurrencyGrpcServerConfig},
};

// Metrics
pub use infrastructure::metrics::{PrometheusBrokerMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
