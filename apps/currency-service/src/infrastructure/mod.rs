//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Configuration loaded from the environment.
pub mod config;

/// gRPC currency service implementation.
pub mod grpc;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Rate table storage, upstream fetchers and the refresh monitor.
pub mod rates;

/// OpenTelemetry tracing integration.
pub mod telemetry;
