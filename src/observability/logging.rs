//! Structured logging.
//!
//! # Responsibilities
//! - Assemble the `tracing` subscriber: console output plus the span and log
//!   bridges for whichever pipelines are running
//! - Install it globally once telemetry is composed
//!
//! # Design Decisions
//! - JSON format for production, human-readable format for development
//! - `RUST_LOG` wins over the configured level; it filters the console only,
//!   the bridges carry their own filters
//! - Boot logs go through a console-only subscriber, since the bridges need
//!   the providers that boot creates

use tracing::Subscriber;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_subscriber::{Layer, Registry};

use crate::config::ServiceConfig;
use crate::observability::sources::{log_layer, span_layer};
use crate::observability::Telemetry;

fn console_layer(config: &ServiceConfig) -> impl Layer<Registry> + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let format = if config.environment.is_production() {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().boxed()
    };
    format.with_filter(filter)
}

/// Subscriber writing to the console and bridging into `telemetry`.
pub fn subscriber(config: &ServiceConfig, telemetry: &Telemetry) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry()
        .with(console_layer(config))
        .with(telemetry.tracer().map(span_layer))
        .with(telemetry.logger_provider().map(log_layer))
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &ServiceConfig, telemetry: &Telemetry) -> Result<(), TryInitError> {
    subscriber(config, telemetry).try_init()
}
