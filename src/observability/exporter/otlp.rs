//! OTLP exporters over HTTP/protobuf or gRPC.
//!
//! # Responsibilities
//! - Build the `opentelemetry-otlp` exporter for one signal kind from the
//!   shared `ExporterConfig`
//! - Wrap it with the configured retry policy
//!
//! # Design Decisions
//! - The endpoint is always passed explicitly, so OTLP environment variables
//!   never redirect an export
//! - The gRPC channel connects lazily; an unreachable collector surfaces per
//!   export, never at construction
//! - `https` collectors reached over gRPC get TLS with the bundled web roots

use opentelemetry_otlp::tonic_types::transport::ClientTlsConfig;
use opentelemetry_otlp::{
    LogExporter, MetricExporter, Protocol as OtlpProtocol, SpanExporter, WithExportConfig,
    WithHttpConfig, WithTonicConfig,
};
use tokio::runtime::Handle;

use super::client::RuntimeHttpClient;
use super::retry::RetryingExporter;
use super::ExporterConfig;
use crate::config::Protocol;
use crate::observability::error::TelemetryError;
use crate::observability::signal::SignalKind;

/// Trace exporter for `config`. Must be called inside a Tokio runtime.
pub fn span_exporter(
    config: &ExporterConfig,
    runtime: &Handle,
) -> Result<RetryingExporter<SpanExporter>, TelemetryError> {
    let kind = SignalKind::Trace;
    let exporter = match config.protocol() {
        Protocol::HttpProtobuf => {
            let client = http_client(kind, config, runtime)?;
            http(SpanExporter::builder().with_http(), kind, config, client).build()
        }
        Protocol::Grpc => grpc(SpanExporter::builder().with_tonic(), kind, config).build(),
    }
    .map_err(|e| TelemetryError::exporter_init(kind, e))?;

    Ok(wrap(kind, exporter, config, runtime))
}

/// Metric exporter for `config`. Must be called inside a Tokio runtime.
pub fn metric_exporter(
    config: &ExporterConfig,
    runtime: &Handle,
) -> Result<RetryingExporter<MetricExporter>, TelemetryError> {
    let kind = SignalKind::Metric;
    let exporter = match config.protocol() {
        Protocol::HttpProtobuf => {
            let client = http_client(kind, config, runtime)?;
            http(MetricExporter::builder().with_http(), kind, config, client).build()
        }
        Protocol::Grpc => grpc(MetricExporter::builder().with_tonic(), kind, config).build(),
    }
    .map_err(|e| TelemetryError::exporter_init(kind, e))?;

    Ok(wrap(kind, exporter, config, runtime))
}

/// Log exporter for `config`. Must be called inside a Tokio runtime.
pub fn log_exporter(
    config: &ExporterConfig,
    runtime: &Handle,
) -> Result<RetryingExporter<LogExporter>, TelemetryError> {
    let kind = SignalKind::Log;
    let exporter = match config.protocol() {
        Protocol::HttpProtobuf => {
            let client = http_client(kind, config, runtime)?;
            http(LogExporter::builder().with_http(), kind, config, client).build()
        }
        Protocol::Grpc => grpc(LogExporter::builder().with_tonic(), kind, config).build(),
    }
    .map_err(|e| TelemetryError::exporter_init(kind, e))?;

    Ok(wrap(kind, exporter, config, runtime))
}

/// TLS settings for a gRPC collector, when its endpoint is `https`.
pub fn grpc_tls(config: &ExporterConfig) -> Option<ClientTlsConfig> {
    config
        .uses_tls()
        .then(|| ClientTlsConfig::new().with_webpki_roots())
}

fn http_client(
    kind: SignalKind,
    config: &ExporterConfig,
    runtime: &Handle,
) -> Result<RuntimeHttpClient, TelemetryError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| TelemetryError::exporter_init(kind, e))?;
    Ok(RuntimeHttpClient::new(client, runtime.clone()))
}

fn http<B>(
    builder: B,
    kind: SignalKind,
    config: &ExporterConfig,
    client: RuntimeHttpClient,
) -> B
where
    B: WithExportConfig + WithHttpConfig,
{
    log_created(kind, config);
    builder
        .with_endpoint(config.signal_endpoint(kind).as_str())
        .with_protocol(OtlpProtocol::HttpBinary)
        .with_timeout(config.timeout())
        .with_headers(config.header_pairs())
        .with_http_client(client)
}

fn grpc<B>(builder: B, kind: SignalKind, config: &ExporterConfig) -> B
where
    B: WithExportConfig + WithTonicConfig,
{
    log_created(kind, config);
    let builder = builder
        .with_endpoint(config.signal_endpoint(kind).as_str())
        .with_protocol(OtlpProtocol::Grpc)
        .with_timeout(config.timeout())
        .with_metadata(config.metadata());

    match grpc_tls(config) {
        Some(tls) => builder.with_tls_config(tls),
        None => builder,
    }
}

fn wrap<E>(
    kind: SignalKind,
    exporter: E,
    config: &ExporterConfig,
    runtime: &Handle,
) -> RetryingExporter<E> {
    RetryingExporter::new(kind, exporter, config.retry(), runtime.clone())
}

fn log_created(kind: SignalKind, config: &ExporterConfig) {
    tracing::debug!(
        signal = %kind,
        protocol = %config.protocol(),
        endpoint = %config.signal_endpoint(kind),
        tls = config.uses_tls(),
        "OTLP exporter created"
    );
}
