//! Pipeline composition.
//!
//! # Responsibilities
//! - Build the shared resource and resolved exporter config exactly once
//! - Compose the trace, metric and log pipelines from one plan
//! - Flush and drain every pipeline at shutdown
//!
//! # Design Decisions
//! - `TelemetryContext` is an ordinary value passed to `compose`, never a global
//! - A pipeline whose exporter cannot start is left out; wiring and
//!   configuration errors abort composition

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracer;

use crate::config::{ServiceConfig, TelemetryConfig};
use crate::observability::error::TelemetryError;
use crate::observability::exporter::ExporterConfig;
use crate::observability::pipeline::{
    PipelineAttachment, PipelineHandle, PipelineSettings, ShutdownOutcome, SignalPipeline,
};
use crate::observability::resource::ResourceIdentity;
use crate::observability::signal::SignalKind;
use crate::observability::sources::InstrumentationSource;

/// Immutable telemetry configuration resolved at boot.
#[derive(Debug, Clone)]
pub struct TelemetryContext {
    resource: Arc<ResourceIdentity>,
    exporter: Arc<ExporterConfig>,
    settings: TelemetryConfig,
}

impl TelemetryContext {
    pub fn new(
        resource: ResourceIdentity,
        exporter: ExporterConfig,
        settings: TelemetryConfig,
    ) -> Self {
        Self {
            resource: Arc::new(resource),
            exporter: Arc::new(exporter),
            settings,
        }
    }

    /// Resolve the exporter, then build the process resource.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, TelemetryError> {
        let exporter = ExporterConfig::resolve(&config.telemetry.exporter)?;
        let resource = ResourceIdentity::build(
            config
                .service
                .name
                .as_deref()
                .or(Some(env!("CARGO_PKG_NAME"))),
            config.environment.is_production(),
            config
                .service
                .version
                .as_deref()
                .or(Some(env!("CARGO_PKG_VERSION"))),
        );
        Ok(Self::new(resource, exporter, config.telemetry.clone()))
    }

    pub fn resource(&self) -> &Arc<ResourceIdentity> {
        &self.resource
    }

    pub fn exporter(&self) -> &Arc<ExporterConfig> {
        &self.exporter
    }

    pub fn pipeline_settings(&self, kind: SignalKind) -> PipelineSettings {
        PipelineSettings::for_signal(kind, &self.settings)
    }
}

/// Which pipelines to build and which sources feed each.
///
/// `None` skips the pipeline.
#[derive(Debug, Clone, Default)]
pub struct TelemetryPlan {
    pub traces: Option<Vec<InstrumentationSource>>,
    pub metrics: Option<Vec<InstrumentationSource>>,
    pub logs: Option<Vec<InstrumentationSource>>,
}

/// Compose every pipeline named in `plan`.
pub fn compose(
    context: &TelemetryContext,
    plan: TelemetryPlan,
) -> Result<Telemetry, TelemetryError> {
    let mut telemetry = Telemetry {
        resource: Some(Arc::clone(&context.resource)),
        ..Telemetry::disabled()
    };

    let requested = [
        (SignalKind::Trace, plan.traces),
        (SignalKind::Metric, plan.metrics),
        (SignalKind::Log, plan.logs),
    ];

    for (kind, sources) in requested {
        let Some(sources) = sources else {
            tracing::info!(signal = %kind, "Telemetry pipeline disabled");
            continue;
        };

        let mut pipeline = SignalPipeline::new(kind, context.pipeline_settings(kind));
        let attached = pipeline.attach(PipelineAttachment {
            resource: Arc::clone(&context.resource),
            sources,
            exporter: Arc::clone(&context.exporter),
        });

        match attached {
            Ok(handle) => telemetry.insert(handle),
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    signal = %kind,
                    error = %e,
                    "Continuing without telemetry pipeline"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(telemetry)
}

/// The composed pipelines. Any of them may be absent.
#[derive(Debug, Default)]
pub struct Telemetry {
    resource: Option<Arc<ResourceIdentity>>,
    traces: Option<PipelineHandle>,
    metrics: Option<PipelineHandle>,
    logs: Option<PipelineHandle>,
}

impl Telemetry {
    /// No pipelines at all.
    pub fn disabled() -> Self {
        Self::default()
    }

    fn insert(&mut self, handle: PipelineHandle) {
        let slot = match handle.kind() {
            SignalKind::Trace => &mut self.traces,
            SignalKind::Metric => &mut self.metrics,
            SignalKind::Log => &mut self.logs,
        };
        *slot = Some(handle);
    }

    pub fn resource(&self) -> Option<&Arc<ResourceIdentity>> {
        self.resource.as_ref()
    }

    pub fn pipeline(&self, kind: SignalKind) -> Option<&PipelineHandle> {
        match kind {
            SignalKind::Trace => self.traces.as_ref(),
            SignalKind::Metric => self.metrics.as_ref(),
            SignalKind::Log => self.logs.as_ref(),
        }
    }

    /// Kinds with a running pipeline.
    pub fn active_pipelines(&self) -> Vec<SignalKind> {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| self.pipeline(*kind).is_some())
            .collect()
    }

    /// Tracer for the `tracing` span bridge, if traces are exported.
    pub fn tracer(&self) -> Option<SdkTracer> {
        self.traces.as_ref().and_then(PipelineHandle::tracer)
    }

    /// Provider for the `tracing` log bridge, if logs are exported.
    pub fn logger_provider(&self) -> Option<&SdkLoggerProvider> {
        self.logs.as_ref().and_then(PipelineHandle::logger_provider)
    }

    fn handles(&self) -> impl Iterator<Item = &PipelineHandle> {
        [&self.traces, &self.metrics, &self.logs]
            .into_iter()
            .filter_map(Option::as_ref)
    }

    /// Flush all pipelines concurrently. True if every flush finished in time.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        join_all(self.handles().map(|handle| handle.force_flush(timeout)))
            .await
            .into_iter()
            .all(|flushed| flushed)
    }

    /// Drain all pipelines concurrently, each bounded by `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Vec<(SignalKind, ShutdownOutcome)> {
        let outcomes = join_all(self.handles().map(|handle| async move {
            (handle.kind(), handle.shutdown(timeout).await)
        }))
        .await;

        for (kind, outcome) in &outcomes {
            match outcome {
                ShutdownOutcome::Drained => {
                    tracing::info!(signal = %kind, "Telemetry pipeline shut down");
                }
                ShutdownOutcome::TimedOut | ShutdownOutcome::Failed => {
                    tracing::warn!(
                        signal = %kind,
                        outcome = ?outcome,
                        "Telemetry pipeline shut down with signals lost"
                    );
                }
            }
        }
        outcomes
    }
}
