//! Logging and metrics setup.
//!
//! Logging goes through `tracing` with an `EnvFilter` (`RUST_LOG`, default
//! `info`) and either human-readable or JSON output. Request metrics go
//! through the `metrics` facade; installing the Prometheus recorder is
//! optional, and without it the macros are no-ops.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Counter of answered requests, labelled by `method` and `status`.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
/// Histogram of request latency in seconds, labelled by `method`.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
/// Gauge of requests currently being handled.
pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";

const LATENCY_BUCKETS: &[f64] = &[
    0.000_5, 0.001, 0.002_5, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global tracing subscriber.
///
/// JSON output includes the current span, so every line logged while a
/// request is handled carries its `request_id`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

/// Builds a Prometheus recorder with the latency buckets configured.
///
/// # Errors
///
/// Fails if the bucket configuration is rejected.
pub fn prometheus_builder() -> anyhow::Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
        LATENCY_BUCKETS,
    )?)
}

/// Installs the Prometheus recorder globally and returns a handle for
/// rendering the scrape output.
///
/// # Errors
///
/// Fails if a global recorder is already installed.
pub fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = prometheus_builder()?.install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Registers help text for the request metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(HTTP_REQUESTS_TOTAL, "Requests answered, by method and status");
    metrics::describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time from request arrival to response, by method"
    );
    metrics::describe_gauge!(HTTP_REQUESTS_IN_FLIGHT, "Requests currently being handled");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_installs_once() {
        assert!(init_tracing(LogFormat::Json).is_ok());
        assert!(init_tracing(LogFormat::Pretty).is_err());
    }

    #[test]
    fn latency_histogram_renders_buckets() {
        let recorder = prometheus_builder().unwrap().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => "GET").record(0.003);
        });

        let rendered = handle.render();
        assert!(rendered.contains("http_request_duration_seconds_bucket"));
        assert!(rendered.contains("le=\"0.005\""));
    }

    #[test]
    fn log_format_defaults_to_pretty() {
        assert_eq!(LogFormat::default(), LogFormat::Pretty);
    }
}
