//! Retry wrapper around the SDK exporters.
//!
//! # Responsibilities
//! - Repeat a failed export while the failure is transient and attempts remain
//! - Drop the batch with a warning once the policy gives up
//!
//! # Design Decisions
//! - The SDK never retries; the wrapper is the only retry layer
//! - Backoff sleeps run on the captured runtime, since the SDK batch workers
//!   poll exports on their own threads

use std::future::Future;
use std::time::Duration;

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::logs::{LogBatch, LogExporter};
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;
use tokio::runtime::Handle;

use crate::observability::error::ExportTransportError;
use crate::observability::signal::SignalKind;
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Exporter that retries transient failures of `inner`.
#[derive(Debug)]
pub struct RetryingExporter<E> {
    kind: SignalKind,
    inner: E,
    policy: RetryPolicy,
    timer: Handle,
}

impl<E> RetryingExporter<E> {
    pub fn new(kind: SignalKind, inner: E, policy: RetryPolicy, timer: Handle) -> Self {
        Self {
            kind,
            inner,
            policy,
            timer,
        }
    }

    async fn run<F, Fut>(&self, items: usize, mut attempt: F) -> OTelSdkResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OTelSdkResult>,
    {
        let kind = self.kind;
        let result = retry_with_backoff(&self.policy, &self.timer, |n| {
            let pending = attempt();
            async move {
                tracing::trace!(signal = %kind, attempt = n, items, "Sending OTLP batch");
                pending.await.map_err(ExportTransportError::from)
            }
        })
        .await;

        result.map_err(|err| {
            tracing::warn!(
                signal = %kind,
                items,
                error = %err,
                "Dropping telemetry batch after failed export"
            );
            err.into()
        })
    }
}

impl<E: SpanExporter> SpanExporter for RetryingExporter<E> {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        let items = batch.len();
        self.run(items, || self.inner.export(batch.clone())).await
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

impl<E: LogExporter> LogExporter for RetryingExporter<E> {
    async fn export(&self, batch: LogBatch<'_>) -> OTelSdkResult {
        let records: Vec<_> = batch.iter().collect();
        self.run(records.len(), || self.inner.export(LogBatch::new(&records)))
            .await
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

impl<E: PushMetricExporter> PushMetricExporter for RetryingExporter<E> {
    async fn export(&self, metrics: &ResourceMetrics) -> OTelSdkResult {
        let items = metrics
            .scope_metrics()
            .map(|scope| scope.metrics().count())
            .sum();
        self.run(items, || self.inner.export(metrics)).await
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn temporality(&self) -> Temporality {
        self.inner.temporality()
    }
}
