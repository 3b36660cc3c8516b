//! gRPC Currency Server
//!
//! Implements the `currency.v1.Currency` service.
//!
//! # Architecture
//!
//! `GetRate` is a unary lookup through the `RateService`. Each
//! `SubscribeRates` stream:
//!
//! 1. Allocates a connection id and a bounded outbound channel
//! 2. Spawns the broker's receive loop over the inbound requests
//! 3. Returns the outbound channel as the response stream
//! 4. Relies on the receive loop to clean up on disconnect

pub mod server;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod currency {
        pub mod v1 {
            include!("../../../../../packages/schema-gen/rust/currency/v1/currency.v1.rs");
        }
    }
}

pub use server::{CurrencyGrpcServer, CurrencyGrpcServerConfig};
