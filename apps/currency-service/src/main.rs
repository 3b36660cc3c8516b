//! Currency Service Binary
//!
//! Starts the exchange rate service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin currency-service
//! ```
//!
//! # Environment Variables
//!
//! - `CURRENCY_GRPC_PORT`: gRPC server port (default: 9092)
//! - `CURRENCY_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `CURRENCY_SHUTDOWN_TIMEOUT_SECS`: Graceful shutdown timeout (default: 30)
//! - `CURRENCY_RATE_SOURCE`: "ecb" | "static" (default: ecb)
//! - `CURRENCY_ECB_URL`: ECB daily reference rate feed URL
//! - `CURRENCY_REFRESH_INTERVAL_MS`: Rate refresh interval (default: 3000)
//! - `CURRENCY_SIMULATE_FLUCTUATION`: Random-walk rates between fetches (default: true)
//! - `CURRENCY_MAX_FLUCTUATION`: Maximum relative change per refresh (default: 0.10)
//! - `CURRENCY_SUBSCRIBER_BUFFER`: Outbound buffer per subscription stream (default: 256)
//! - `CURRENCY_NOTIFICATION_BUFFER`: Pending refresh notifications (default: 16)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: currency-service)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use currency_service::infrastructure::metrics::PrometheusBrokerMetrics;
use currency_service::infrastructure::telemetry;
use currency_service::{
    CurrencyGrpcServer, CurrencyGrpcServerConfig, EcbFetcher, HealthServer, HealthServerState,
    MonitorSettings, RateBroker, RateFetcher, RateMonitor, RateService, RateSourceKind, RateStore,
    ServiceConfig, StaticFetcher, init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

/// Timeout for a single ECB feed request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Currency Service");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Rate store and upstream fetcher
    let store = Arc::new(RateStore::new());
    let fetcher: Arc<dyn RateFetcher> = match config.rates.source {
        RateSourceKind::Ecb => Arc::new(
            EcbFetcher::new(config.rates.ecb_url.clone(), FETCH_TIMEOUT)
                .context("failed to build ECB client")?,
        ),
        RateSourceKind::Static => Arc::new(StaticFetcher::new()),
    };

    // Broker and rate lookups share the store
    let (notify_tx, notify_rx) = mpsc::channel(config.broker.notification_buffer);
    let broker = Arc::new(
        RateBroker::new(store.clone()).with_metrics(Arc::new(PrometheusBrokerMetrics)),
    );
    let rates = RateService::new(store.clone());

    // Spawn rate monitor
    let monitor = RateMonitor::new(
        Arc::clone(&store),
        fetcher,
        MonitorSettings::from(&config.rates),
        notify_tx,
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown_token.clone()));

    // Spawn broadcast loop
    let broadcast_broker = Arc::clone(&broker);
    let broadcast_shutdown = shutdown_token.clone();
    let broker_task = tokio::spawn(async move {
        broadcast_broker.run(notify_rx, broadcast_shutdown).await;
    });

    // Spawn health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&store),
        Arc::clone(&broker),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn gRPC server
    let grpc_addr = SocketAddr::from(([0, 0, 0, 0], config.server.grpc_port));
    let grpc_service = CurrencyGrpcServer::new(
        CurrencyGrpcServerConfig {
            subscriber_buffer: config.broker.subscriber_buffer,
        },
        rates,
        Arc::clone(&broker),
        shutdown_token.clone(),
    )
    .into_service();
    let grpc_shutdown = shutdown_token.clone();

    let grpc_task = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        if let Err(e) = Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
        }
        tracing::info!("gRPC server stopped");
    });

    tracing::info!("Currency service ready");

    await_shutdown(shutdown_token).await;

    let timeout = config.server.shutdown_timeout;
    let drained = tokio::time::timeout(timeout, async {
        let _ = tokio::join!(grpc_task, health_task, broker_task, monitor_task);
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            "Graceful shutdown timed out"
        );
    }

    tracing::info!("Currency service stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        grpc_port = config.server.grpc_port,
        health_port = config.server.health_port,
        rate_source = config.rates.source.as_str(),
        refresh_interval_ms = u64::try_from(config.rates.refresh_interval.as_millis()).unwrap_or(u64::MAX),
        simulate_fluctuation = config.rates.simulate_fluctuation,
        "Configuration loaded"
    );
    tracing::debug!(
        ecb_url = %config.rates.ecb_url,
        max_fluctuation = config.rates.max_fluctuation,
        subscriber_buffer = config.broker.subscriber_buffer,
        notification_buffer = config.broker.notification_buffer,
        "Rate and broker settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!("Graceful shutdown started");
}
