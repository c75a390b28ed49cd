//! Logging and tracing initialization.
//!
//! Logs go to stderr so stdout carries only invocation output. When an OTLP
//! endpoint is given, spans are also exported over gRPC; the returned
//! [`TelemetryGuard`] flushes and shuts the exporter down when dropped.

use anyhow::Context;
use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SERVICE_NAME: &str = "dubbo-invoke";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Number of `-v` flags given.
    pub verbosity: u8,
    pub format: LogFormat,
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Keeps the OTLP exporter alive; shuts it down on drop.
pub struct TelemetryGuard {
    tracer_provider: Option<TracerProvider>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("otlp", &self.tracer_provider.is_some())
            .finish()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                tracing::error!("error shutting down tracer provider: {e}");
            }
        }
    }
}

/// Installs the global subscriber.
pub fn init(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.default_directive()))
        .context("failed to create log filter")?;

    let tracer_provider = config
        .otlp_endpoint
        .as_deref()
        .map(init_tracer_provider)
        .transpose()?;
    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)));

    let (text_layer, json_layer) = match config.format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().with_writer(std::io::stderr).json()),
        ),
    };

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    info!(
        format = ?config.format,
        otlp = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "telemetry initialized"
    );
    Ok(TelemetryGuard { tracer_provider })
}

fn init_tracer_provider(endpoint: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .with_context(|| format!("failed to build OTLP exporter for {endpoint}"))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_directive() {
        let mut config = TelemetryConfig::default();
        assert_eq!(config.default_directive(), "warn");
        config.verbosity = 2;
        assert_eq!(config.default_directive(), "debug");
        config.verbosity = 9;
        assert_eq!(config.default_directive(), "trace");
    }

    #[test]
    fn test_guard_without_exporter_drops_cleanly() {
        let guard = TelemetryGuard {
            tracer_provider: None,
        };
        assert_eq!(format!("{guard:?}"), "TelemetryGuard { otlp: false }");
    }
}
