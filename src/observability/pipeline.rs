//! Signal pipelines.
//!
//! # Responsibilities
//! - Validate source capabilities against the pipeline kind
//! - Build one SDK provider per signal kind, backed by an OTLP exporter
//! - Flush on demand and drain once, within a deadline, at shutdown
//!
//! # Data Flow
//! ```text
//! SignalPipeline::attach
//!     → traces:  SdkTracerProvider + BatchSpanProcessor   (ParentBased(AlwaysOn))
//!     → metrics: SdkMeterProvider  + PeriodicReader
//!     → logs:    SdkLoggerProvider + BatchLogProcessor
//!     → RetryingExporter → OTLP exporter → collector
//! ```
//!
//! # Design Decisions
//! - `SignalPipeline` is a single-shot builder; attaching returns the live handle
//! - Provider flush and shutdown block, so they run on the blocking pool
//! - Shutdown starts one drain; every caller waits on that same drain

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::logs::{self, BatchLogProcessor, SdkLoggerProvider};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{self, BatchSpanProcessor, Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tokio::runtime::Handle;

use crate::config::TelemetryConfig;
use crate::observability::error::TelemetryError;
use crate::observability::exporter::{self, ExporterConfig};
use crate::observability::resource::ResourceIdentity;
use crate::observability::signal::SignalKind;
use crate::observability::sources::InstrumentationSource;

/// Instrumentation scope of spans and logs produced through `tracing`.
pub const TRACING_SCOPE: &str = "forecast_service";

/// Batching knobs for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_queue_size: usize,
    pub max_export_batch_size: usize,
    pub scheduled_delay: Duration,
    /// Metric pipelines only: how often instruments are collected and exported.
    pub collection_interval: Option<Duration>,
}

impl PipelineSettings {
    pub fn for_signal(kind: SignalKind, config: &TelemetryConfig) -> Self {
        Self {
            max_queue_size: config.batch.max_queue_size,
            max_export_batch_size: config.batch.max_export_batch_size,
            scheduled_delay: Duration::from_millis(config.batch.scheduled_delay_ms),
            collection_interval: (kind == SignalKind::Metric)
                .then(|| Duration::from_millis(config.metrics.interval_ms)),
        }
    }

    fn span_batch(&self) -> trace::BatchConfig {
        trace::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size.max(1))
            .with_max_export_batch_size(self.max_export_batch_size.max(1))
            .with_scheduled_delay(self.scheduled_delay)
            .build()
    }

    fn log_batch(&self) -> logs::BatchConfig {
        logs::BatchConfigBuilder::default()
            .with_max_queue_size(self.max_queue_size.max(1))
            .with_max_export_batch_size(self.max_export_batch_size.max(1))
            .with_scheduled_delay(self.scheduled_delay)
            .build()
    }

    fn export_interval(&self) -> Duration {
        self.collection_interval.unwrap_or(self.scheduled_delay)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay: Duration::from_secs(5),
            collection_interval: None,
        }
    }
}

/// Everything a pipeline needs to start, passed in one value.
pub struct PipelineAttachment {
    pub resource: Arc<ResourceIdentity>,
    pub sources: Vec<InstrumentationSource>,
    pub exporter: Arc<ExporterConfig>,
}

/// Result of a bounded shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The final flush completed before the deadline.
    Drained,
    /// The deadline passed; buffered signals were abandoned.
    TimedOut,
    /// The provider reported an error while draining.
    Failed,
}

/// SDK provider behind a pipeline.
#[derive(Debug, Clone)]
pub enum SignalProvider {
    Traces(SdkTracerProvider),
    Metrics(SdkMeterProvider),
    Logs(SdkLoggerProvider),
}

impl SignalProvider {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalProvider::Traces(_) => SignalKind::Trace,
            SignalProvider::Metrics(_) => SignalKind::Metric,
            SignalProvider::Logs(_) => SignalKind::Log,
        }
    }

    fn force_flush(&self) -> OTelSdkResult {
        match self {
            SignalProvider::Traces(provider) => provider.force_flush(),
            SignalProvider::Metrics(provider) => provider.force_flush(),
            SignalProvider::Logs(provider) => provider.force_flush(),
        }
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        match self {
            SignalProvider::Traces(provider) => provider.shutdown_with_timeout(timeout),
            SignalProvider::Metrics(provider) => provider.shutdown_with_timeout(timeout),
            SignalProvider::Logs(provider) => provider.shutdown_with_timeout(timeout),
        }
    }
}

/// Single-shot builder for one signal kind.
pub struct SignalPipeline {
    kind: SignalKind,
    settings: PipelineSettings,
    attached: bool,
}

impl SignalPipeline {
    pub fn new(kind: SignalKind, settings: PipelineSettings) -> Self {
        Self {
            kind,
            settings,
            attached: false,
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// Attach the resource, sources and an OTLP exporter, and start the provider.
    pub fn attach(
        &mut self,
        attachment: PipelineAttachment,
    ) -> Result<PipelineHandle, TelemetryError> {
        let kind = self.kind;
        let settings = self.settings;
        let exporter = attachment.exporter;
        self.attach_with(attachment.resource, attachment.sources, |resource, runtime| {
            build_provider(kind, settings, &exporter, resource, runtime)
        })
    }

    /// Like [`attach`](Self::attach), with a caller-built provider.
    ///
    /// `build` receives the SDK resource and the runtime the pipeline runs on.
    pub fn attach_with<F>(
        &mut self,
        resource: Arc<ResourceIdentity>,
        sources: Vec<InstrumentationSource>,
        build: F,
    ) -> Result<PipelineHandle, TelemetryError>
    where
        F: FnOnce(Resource, &Handle) -> Result<SignalProvider, TelemetryError>,
    {
        self.check_attachable(&sources)?;
        let runtime = Handle::try_current()
            .map_err(|e| TelemetryError::exporter_init(self.kind, e))?;

        let provider = build(resource.to_resource(), &runtime)?;
        if provider.kind() != self.kind {
            return Err(TelemetryError::exporter_init(
                self.kind,
                format!("provider emits {}", provider.kind()),
            ));
        }
        self.attached = true;

        for source in &sources {
            source.bind(&provider, &runtime);
        }
        let names: Vec<&'static str> = sources.iter().map(InstrumentationSource::name).collect();
        let bridged = sources.iter().any(InstrumentationSource::bridges_tracing);

        tracing::info!(
            signal = %self.kind,
            sources = ?names,
            max_queue_size = self.settings.max_queue_size,
            max_export_batch_size = self.settings.max_export_batch_size,
            scheduled_delay_ms = self.settings.scheduled_delay.as_millis() as u64,
            "Telemetry pipeline started"
        );

        Ok(PipelineHandle {
            inner: Arc::new(HandleInner {
                kind: self.kind,
                resource,
                provider,
                sources: names,
                bridged,
                drain: Mutex::new(None),
            }),
        })
    }

    fn check_attachable(&self, sources: &[InstrumentationSource]) -> Result<(), TelemetryError> {
        if self.attached {
            return Err(TelemetryError::AlreadyAttached { kind: self.kind });
        }
        match sources.iter().find(|source| !source.supports(self.kind)) {
            Some(source) => Err(TelemetryError::UnsupportedSource {
                source_name: source.name(),
                kind: self.kind,
            }),
            None => Ok(()),
        }
    }
}

fn build_provider(
    kind: SignalKind,
    settings: PipelineSettings,
    config: &ExporterConfig,
    resource: Resource,
    runtime: &Handle,
) -> Result<SignalProvider, TelemetryError> {
    let provider = match kind {
        SignalKind::Trace => {
            let processor = BatchSpanProcessor::builder(exporter::span_exporter(config, runtime)?)
                .with_batch_config(settings.span_batch())
                .build();
            SignalProvider::Traces(
                SdkTracerProvider::builder()
                    .with_resource(resource)
                    .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
                    .with_span_processor(processor)
                    .build(),
            )
        }
        SignalKind::Metric => {
            let reader = PeriodicReader::builder(exporter::metric_exporter(config, runtime)?)
                .with_interval(settings.export_interval())
                .build();
            SignalProvider::Metrics(
                SdkMeterProvider::builder()
                    .with_resource(resource)
                    .with_reader(reader)
                    .build(),
            )
        }
        SignalKind::Log => {
            let processor = BatchLogProcessor::builder(exporter::log_exporter(config, runtime)?)
                .with_batch_config(settings.log_batch())
                .build();
            SignalProvider::Logs(
                SdkLoggerProvider::builder()
                    .with_resource(resource)
                    .with_log_processor(processor)
                    .build(),
            )
        }
    };
    Ok(provider)
}

type Drain = Shared<BoxFuture<'static, ShutdownOutcome>>;

struct HandleInner {
    kind: SignalKind,
    resource: Arc<ResourceIdentity>,
    provider: SignalProvider,
    sources: Vec<&'static str>,
    bridged: bool,
    drain: Mutex<Option<Drain>>,
}

/// Live pipeline. Cheap to clone; all clones share one provider.
#[derive(Clone)]
pub struct PipelineHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("kind", &self.inner.kind)
            .field("sources", &self.inner.sources)
            .finish()
    }
}

impl PipelineHandle {
    pub fn kind(&self) -> SignalKind {
        self.inner.kind
    }

    pub fn resource(&self) -> &Arc<ResourceIdentity> {
        &self.inner.resource
    }

    pub fn provider(&self) -> &SignalProvider {
        &self.inner.provider
    }

    /// Names of the sources bound at attach time, in attach order.
    pub fn sources(&self) -> &[&'static str] {
        &self.inner.sources
    }

    /// Tracer for the `tracing` span bridge, when a span source was attached.
    pub fn tracer(&self) -> Option<SdkTracer> {
        match &self.inner.provider {
            SignalProvider::Traces(provider) if self.inner.bridged => {
                Some(provider.tracer(TRACING_SCOPE))
            }
            _ => None,
        }
    }

    /// Provider for the `tracing` log bridge, when the log source was attached.
    pub fn logger_provider(&self) -> Option<&SdkLoggerProvider> {
        match &self.inner.provider {
            SignalProvider::Logs(provider) if self.inner.bridged => Some(provider),
            _ => None,
        }
    }

    /// Export everything buffered so far. Returns false on error or deadline.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        let provider = self.inner.provider.clone();
        let flush = tokio::task::spawn_blocking(move || provider.force_flush());
        match tokio::time::timeout(timeout, flush).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                tracing::debug!(signal = %self.inner.kind, error = %e, "Telemetry flush failed");
                false
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }

    /// Flush once more and close the provider, waiting at most `timeout`.
    ///
    /// The first call starts the drain. Concurrent and later calls wait on
    /// the same drain and report its outcome.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        let drain = match self.inner.drain.lock() {
            Ok(mut slot) => slot
                .get_or_insert_with(|| start_drain(&self.inner, timeout))
                .clone(),
            Err(_) => return ShutdownOutcome::Failed,
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    signal = %self.inner.kind,
                    timeout_ms = timeout.as_millis() as u64,
                    "Telemetry pipeline did not drain in time; pending signals abandoned"
                );
                ShutdownOutcome::TimedOut
            }
        }
    }
}

fn start_drain(inner: &HandleInner, timeout: Duration) -> Drain {
    let kind = inner.kind;
    let provider = inner.provider.clone();
    let task = tokio::task::spawn_blocking(move || provider.shutdown_with_timeout(timeout));

    async move {
        match task.await {
            Ok(Ok(())) => {
                tracing::debug!(signal = %kind, "Telemetry pipeline drained");
                ShutdownOutcome::Drained
            }
            Ok(Err(OTelSdkError::Timeout(_))) => ShutdownOutcome::TimedOut,
            Ok(Err(e)) => {
                tracing::warn!(signal = %kind, error = %e, "Telemetry pipeline shutdown failed");
                ShutdownOutcome::Failed
            }
            Err(e) => {
                tracing::warn!(signal = %kind, error = %e, "Telemetry drain task failed");
                ShutdownOutcome::Failed
            }
        }
    }
    .boxed()
    .shared()
}
