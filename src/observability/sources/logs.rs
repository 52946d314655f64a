//! Bridge from `tracing` events to OTLP log records.
//!
//! # Responsibilities
//! - Forward INFO-and-above events to the log pipeline's provider
//! - Leave trace correlation to the SDK logger, which reads the active
//!   context set by the span bridge
//!
//! # Design Decisions
//! - The telemetry layer's own diagnostics and transport crates are skipped
//!   so exporting never produces more records to export

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const IGNORED_TARGETS: [&str; 7] = [
    "forecast_service::observability",
    "hyper",
    "h2",
    "tonic",
    "tower",
    "reqwest",
    "opentelemetry",
];

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

/// `tracing` layer emitting log records through `provider`.
pub fn log_layer<S>(provider: &SdkLoggerProvider) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    OpenTelemetryTracingBridge::new(provider).with_filter(filter_fn(|metadata| {
        metadata.is_event()
            && *metadata.level() <= Level::INFO
            && !is_ignored(metadata.target())
    }))
}
