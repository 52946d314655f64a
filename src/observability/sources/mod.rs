//! Instrumentation sources.
//!
//! # Data Flow
//! ```text
//! Instrumentation::new()            (before logging init and boot)
//!     → http_source() / log_source() hand shared state to pipelines
//!     → SignalPipeline::attach checks capabilities, then binds each source:
//!         span / log sources   → feed the tracing bridge layers (logging.rs)
//!         metric sources       → instruments registered on the pipeline's meter
//! ```
//!
//! # Design Decisions
//! - Capabilities are declared per variant and checked at registration
//! - A source that never gets bound simply produces nothing

pub mod http;
pub mod logs;
pub mod process;
pub mod runtime;

use std::fmt;
use std::sync::Arc;

use opentelemetry::metrics::MeterProvider as _;
use tokio::runtime::Handle;

use crate::observability::pipeline::SignalProvider;
use crate::observability::signal::SignalKind;

pub use http::{span_layer, track_requests, HttpInstrumentation};
pub use logs::log_layer;

/// A producer of signals, tagged with the signal kinds it can emit.
#[derive(Clone)]
pub enum InstrumentationSource {
    /// Inbound request spans and request metrics.
    HttpServer(Arc<HttpInstrumentation>),
    /// CPU, memory, thread and uptime gauges.
    Process,
    /// Tokio scheduler gauges.
    Runtime,
    /// `tracing` events as log records.
    LogBridge,
}

impl InstrumentationSource {
    pub fn name(&self) -> &'static str {
        match self {
            InstrumentationSource::HttpServer(_) => "http-server",
            InstrumentationSource::Process => "process",
            InstrumentationSource::Runtime => "runtime",
            InstrumentationSource::LogBridge => "log-bridge",
        }
    }

    pub fn capabilities(&self) -> &'static [SignalKind] {
        match self {
            InstrumentationSource::HttpServer(_) => &[SignalKind::Trace, SignalKind::Metric],
            InstrumentationSource::Process | InstrumentationSource::Runtime => {
                &[SignalKind::Metric]
            }
            InstrumentationSource::LogBridge => &[SignalKind::Log],
        }
    }

    pub fn supports(&self, kind: SignalKind) -> bool {
        self.capabilities().contains(&kind)
    }

    /// Whether the source reaches its pipeline through a `tracing` layer.
    pub(crate) fn bridges_tracing(&self) -> bool {
        matches!(
            self,
            InstrumentationSource::HttpServer(_) | InstrumentationSource::LogBridge
        )
    }

    /// Connect the source to a freshly built provider.
    pub(crate) fn bind(&self, provider: &SignalProvider, runtime: &Handle) {
        let SignalProvider::Metrics(meters) = provider else {
            return;
        };
        match self {
            InstrumentationSource::HttpServer(http) => {
                http.bind_metrics(&meters.meter(http::SCOPE));
            }
            InstrumentationSource::Process => {
                process::register(&meters.meter(process::SCOPE));
            }
            InstrumentationSource::Runtime => {
                runtime::register(&meters.meter(runtime::SCOPE), runtime.clone());
            }
            InstrumentationSource::LogBridge => {}
        }
    }
}

impl fmt::Debug for InstrumentationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared instrumentation state, created once per process.
#[derive(Clone, Default)]
pub struct Instrumentation {
    http: Arc<HttpInstrumentation>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http(&self) -> Arc<HttpInstrumentation> {
        Arc::clone(&self.http)
    }

    pub fn http_source(&self) -> InstrumentationSource {
        InstrumentationSource::HttpServer(self.http())
    }

    pub fn log_source(&self) -> InstrumentationSource {
        InstrumentationSource::LogBridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let instrumentation = Instrumentation::new();

        assert!(instrumentation.http_source().supports(SignalKind::Trace));
        assert!(instrumentation.http_source().supports(SignalKind::Metric));
        assert!(!instrumentation.http_source().supports(SignalKind::Log));
        assert_eq!(
            InstrumentationSource::Process.capabilities(),
            &[SignalKind::Metric]
        );
        assert!(!InstrumentationSource::Runtime.supports(SignalKind::Trace));
        assert!(instrumentation.log_source().supports(SignalKind::Log));
    }
}
