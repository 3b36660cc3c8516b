//! Logging and Trace Export
//!
//! Installs the global `tracing` subscriber: formatted logs always, plus an
//! OTLP span exporter when one is configured. An exporter that cannot be
//! built is reported and skipped; logging still comes up.
//!
//! | Variable | Effect | Default |
//! |----------|--------|---------|
//! | `RUST_LOG` | Log filter directives | `currency_service=info` |
//! | `OTEL_ENABLED` | `false` turns span export off | on |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Collector address | `http://localhost:4318` |
//! | `OTEL_SERVICE_NAME` | `service.name` resource attribute | `currency-service` |
//!
//! HTTP/2 transport crates are capped at `warn` whatever `RUST_LOG` says.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SERVICE_NAME: &str = "currency-service";
const OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "currency_service=info";

/// Appended to every filter.
const TRANSPORT_DIRECTIVES: &str = "h2=warn,hyper=warn";

/// Where logs and spans go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `service.name` on exported spans.
    pub service_name: String,
    /// OTLP collector; `None` disables span export.
    pub otlp_endpoint: Option<String>,
    /// Raw `RUST_LOG` value.
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            otlp_endpoint: Some(OTLP_ENDPOINT.to_string()),
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    /// Read the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let export = lookup("OTEL_ENABLED").is_none_or(|v| !v.eq_ignore_ascii_case("false"));

        Self {
            service_name: lookup("OTEL_SERVICE_NAME").unwrap_or_else(|| SERVICE_NAME.to_string()),
            otlp_endpoint: export.then(|| {
                lookup("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or_else(|| OTLP_ENDPOINT.to_string())
            }),
            log_filter: lookup("RUST_LOG"),
        }
    }
}

/// Flushes and stops span export on drop.
///
/// Hold it for the life of `main`.
#[must_use = "dropping the guard stops span export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    pub const fn is_exporting(&self) -> bool {
        self.provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        if let Err(e) = provider.shutdown() {
            eprintln!("Span exporter shutdown failed: {e}");
        }
    }
}

/// Install the subscriber using the process environment.
pub fn init() -> TelemetryGuard {
    init_with_config(TelemetryConfig::from_env())
}

/// Install the subscriber using `config`.
///
/// A second call leaves the first subscriber in place.
pub fn init_with_config(config: TelemetryConfig) -> TelemetryGuard {
    let (provider, export_error) = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => match tracer_provider(&config.service_name, endpoint) {
            Ok(provider) => (Some(provider), None),
            Err(e) => (None, Some(e)),
        },
        None => (None, None),
    };

    let span_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let installed = tracing_subscriber::registry()
        .with(log_filter(config.log_filter.as_deref()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(span_layer)
        .try_init();

    if let Err(e) = installed {
        eprintln!("Tracing subscriber already installed: {e}");
    }
    if let Some(e) = export_error {
        tracing::warn!(error = %e, "OTLP exporter unavailable, logging only");
    }

    TelemetryGuard { provider }
}

/// Build the filter from a `RUST_LOG` value.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    let user = directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(format!("{d},{TRANSPORT_DIRECTIVES}")).ok());

    user.unwrap_or_else(|| EnvFilter::new(format!("{DEFAULT_LOG_FILTER},{TRANSPORT_DIRECTIVES}")))
}

fn tracer_provider(
    service_name: &str,
    endpoint: &str,
) -> Result<SdkTracerProvider, ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> TelemetryConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        TelemetryConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_matches_default() {
        assert_eq!(config(&[]), TelemetryConfig::default());
    }

    #[test_case("false" ; "lowercase")]
    #[test_case("FALSE" ; "uppercase")]
    fn disabling_export_drops_endpoint(value: &str) {
        let config = config(&[
            ("OTEL_ENABLED", value),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
        ]);
        assert_eq!(config.otlp_endpoint, None);
    }

    #[test_case("true" ; "true")]
    #[test_case("0" ; "zero")]
    #[test_case("" ; "empty")]
    fn other_values_keep_export_on(value: &str) {
        assert!(config(&[("OTEL_ENABLED", value)]).otlp_endpoint.is_some());
    }

    #[test]
    fn overrides_are_read() {
        let config = config(&[
            ("OTEL_SERVICE_NAME", "rates-canary"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ("RUST_LOG", "debug"),
        ]);

        assert_eq!(config.service_name, "rates-canary");
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test_case(None ; "unset")]
    #[test_case(Some("  ") ; "blank")]
    #[test_case(Some("currency_service=loud") ; "unparsable")]
    fn bad_or_missing_filter_uses_default(directives: Option<&str>) {
        let filter = log_filter(directives).to_string();
        assert!(filter.contains("currency_service=info"), "{filter}");
        assert!(filter.contains("h2=warn"), "{filter}");
    }

    #[test]
    fn user_filter_keeps_transport_caps() {
        let filter = log_filter(Some("currency_service=debug")).to_string();
        assert!(filter.contains("currency_service=debug"), "{filter}");
        assert!(filter.contains("hyper=warn"), "{filter}");
        assert!(filter.contains("h2=warn"), "{filter}");
    }
}
