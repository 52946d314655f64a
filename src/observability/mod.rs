//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Boot:
//!     ExporterConfig::resolve ─┐
//!     ResourceIdentity::build ─┴→ TelemetryContext
//!         → telemetry::compose(plan) → Telemetry { traces, metrics, logs }
//!
//! Runtime:
//!     sources/http.rs   (request spans via span_layer, request instruments)
//!     sources/process.rs, sources/runtime.rs (observable gauges)
//!     sources/logs.rs   (tracing events via log_layer)
//!         → pipeline.rs (SDK provider: batch processor or periodic reader)
//!         → exporter/   (OTLP over HTTP or gRPC, retries)
//!         → collector
//! ```
//!
//! # Design Decisions
//! - One resource identity per process, shared by every pipeline
//! - Export never blocks or fails the request path
//! - Local structured logging (logging.rs) works with or without export

pub mod error;
pub mod exporter;
pub mod logging;
pub mod pipeline;
pub mod resource;
pub mod signal;
pub mod sources;
pub mod telemetry;

pub use error::{ExportTransportError, TelemetryError};
pub use exporter::ExporterConfig;
pub use pipeline::{
    PipelineAttachment, PipelineHandle, PipelineSettings, ShutdownOutcome, SignalPipeline,
    SignalProvider,
};
pub use resource::ResourceIdentity;
pub use signal::SignalKind;
pub use sources::{Instrumentation, InstrumentationSource};
pub use telemetry::{compose, Telemetry, TelemetryContext, TelemetryPlan};
