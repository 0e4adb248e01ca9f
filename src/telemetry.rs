//! Subscriber and exporter wiring.
//!
//! Logging always goes through `tracing` behind an [`EnvFilter`]; a bare
//! level in the config scopes to this crate's targets, while full filter
//! strings pass through untouched. The `prometheus` feature serves metrics
//! over HTTP and the `otel` feature ships spans to an OTLP collector, both
//! driven by [`TelemetryConfig`].

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

/// Provider handle kept for shutdown. Spans still queued in the batch
/// exporter flush only when it is shut down explicitly.
#[cfg(feature = "otel")]
static TRACER_PROVIDER: std::sync::OnceLock<opentelemetry_sdk::trace::SdkTracerProvider> =
    std::sync::OnceLock::new();

/// Install the global subscriber plus whichever exporters the enabled
/// features and [`TelemetryConfig`] call for.
pub fn init(config: &TelemetryConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // RUST_LOG wins over the configured level when both are present.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives_from(&config.log_level)));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "otel")]
    let registry = {
        let span_layer = match &config.opentelemetry {
            Some(otel_config) => {
                use opentelemetry::trace::TracerProvider;
                use opentelemetry::KeyValue;
                use opentelemetry_otlp::WithExportConfig;

                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(&otel_config.endpoint)
                    .build()?;

                let resource = opentelemetry_sdk::Resource::builder()
                    .with_attributes([
                        KeyValue::new(
                            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                            otel_config.service_name.clone(),
                        ),
                        KeyValue::new(
                            opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                            env!("CARGO_PKG_VERSION"),
                        ),
                    ])
                    .build();

                let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_batch_exporter(exporter)
                    .with_resource(resource)
                    .build();

                let tracer = provider.tracer("ember-dns");
                let _ = TRACER_PROVIDER.set(provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            }
            None => None,
        };
        registry.with(span_layer)
    };

    registry.init();

    #[cfg(feature = "otel")]
    if let Some(otel_config) = &config.opentelemetry {
        tracing::info!(endpoint = %otel_config.endpoint, "exporting spans over OTLP");
    }

    #[cfg(feature = "prometheus")]
    if let Some(addr) = config.prometheus_addr {
        use metrics_exporter_prometheus::PrometheusBuilder;

        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }

    Ok(())
}

/// Flush queued spans and shut the exporter down, when one was installed.
pub fn shutdown() {
    #[cfg(feature = "otel")]
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "tracer provider shutdown failed");
        }
    }
}

/// Expand a bare level like `"info"` into directives scoping it to this
/// crate, with everything else at warn. Strings that already carry
/// directives are used as-is.
fn directives_from(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,ember_dns={level}")
    }
}
