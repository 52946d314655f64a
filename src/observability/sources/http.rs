//! HTTP server instrumentation.
//!
//! # Responsibilities
//! - One server span per request, continuing an incoming `traceparent`
//! - Request duration histogram and in-flight request count
//!
//! # Data Flow
//! ```text
//! request → track_requests
//!     → TraceContextPropagator extracts the remote parent
//!     → `http_request` tracing span (otel.* fields) ── span_layer ──→ trace pipeline
//!     → handler runs inside the span; its events carry the trace ids
//!     → status recorded on the span, duration on the histogram
//! ```
//!
//! # Design Decisions
//! - Installed with `Router::layer`, so the matched route template is known
//! - Unknown methods collapse to `_OTHER` to bound metric cardinality
//! - The remote sampled flag decides recording through the parent-based sampler
//! - Nothing here can fail the request; missing data omits an attribute

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::metrics::{Histogram, Meter, UpDownCounter};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::KeyValue;
use opentelemetry_http::HeaderExtractor;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracer;
use tracing::field::Empty;
use tracing::{Instrument, Level, Subscriber};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub(crate) const SCOPE: &str = "forecast_service.http";

/// Default explicit bucket bounds for request durations, in seconds.
pub const DURATION_BOUNDS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Targets whose spans never reach the trace pipeline.
const TRANSPORT_TARGETS: [&str; 6] =
    ["hyper", "h2", "tonic", "tower", "reqwest", "opentelemetry"];

struct HttpMetrics {
    duration: Histogram<f64>,
    active: UpDownCounter<i64>,
}

/// Shared state behind the HTTP middleware.
///
/// Created before the pipelines exist; the metric pipeline binds its
/// instruments later.
#[derive(Default)]
pub struct HttpInstrumentation {
    active: AtomicI64,
    metrics: OnceLock<HttpMetrics>,
}

impl HttpInstrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind_metrics(&self, meter: &Meter) {
        let metrics = HttpMetrics {
            duration: meter
                .f64_histogram("http.server.request.duration")
                .with_description("Duration of HTTP server requests.")
                .with_unit("s")
                .with_boundaries(DURATION_BOUNDS.to_vec())
                .build(),
            active: meter
                .i64_up_down_counter("http.server.active_requests")
                .with_description("Number of active HTTP server requests.")
                .with_unit("{request}")
                .build(),
        };
        if self.metrics.set(metrics).is_err() {
            tracing::debug!("HTTP metrics already bound; keeping the first pipeline");
        }
    }

    pub fn active_requests(&self) -> i64 {
        self.active.load(Ordering::Relaxed)
    }

    fn started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = self.metrics.get() {
            metrics.active.add(1, &[]);
        }
    }

    fn finished(&self, seconds: f64, attributes: &[KeyValue]) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        if let Some(metrics) = self.metrics.get() {
            metrics.active.add(-1, &[]);
            metrics.duration.record(seconds, attributes);
        }
    }
}

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        Method::PATCH => "PATCH",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "_OTHER",
    }
}

/// Span name: `"{METHOD} {route}"`, or the bare method when no route matched.
pub fn span_name(method: &str, route: Option<&str>) -> String {
    match route {
        Some(route) => format!("{} {}", method, route),
        None => method.to_string(),
    }
}

fn is_transport(target: &str) -> bool {
    TRANSPORT_TARGETS.iter().any(|prefix| target.starts_with(prefix))
}

/// `tracing` layer exporting spans through `tracer`.
pub fn span_layer<S>(tracer: SdkTracer) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_location(false)
        .with_threads(false)
        .with_tracked_inactivity(false)
        .with_filter(filter_fn(|metadata| {
            *metadata.level() <= Level::INFO && !is_transport(metadata.target())
        }))
}

/// Middleware recording spans and metrics for every request.
pub async fn track_requests(
    State(instrumentation): State<Arc<HttpInstrumentation>>,
    request: Request,
    next: Next,
) -> Response {
    let method = method_label(request.method());
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let span = tracing::info_span!(
        "http_request",
        otel.name = %span_name(method, route.as_deref()),
        otel.kind = "server",
        otel.status_code = Empty,
        otel.status_description = Empty,
        http.request.method = method,
        url.path = request.uri().path(),
        http.route = Empty,
        user_agent.original = Empty,
        http.response.status_code = Empty,
    );
    if let Some(route) = &route {
        span.record("http.route", route.as_str());
    }
    if let Some(user_agent) = &user_agent {
        span.record("user_agent.original", user_agent.as_str());
    }

    let parent = TraceContextPropagator::new().extract(&HeaderExtractor(request.headers()));
    // Fails only when no OpenTelemetry layer is installed.
    let _ = span.set_parent(parent);

    let timer = Instant::now();
    instrumentation.started();
    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    span.record("http.response.status_code", i64::from(status.as_u16()));
    if status.is_server_error() {
        span.record("otel.status_code", "error");
        let description = format!("HTTP {}", status.as_u16());
        span.record("otel.status_description", description.as_str());
    }

    let mut attributes = vec![
        KeyValue::new("http.request.method", method),
        KeyValue::new("http.response.status_code", i64::from(status.as_u16())),
    ];
    if let Some(route) = route {
        attributes.push(KeyValue::new("http.route", route));
    }
    instrumentation.finished(timer.elapsed().as_secs_f64(), &attributes);

    response
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn test_span_name() {
        assert_eq!(span_name("GET", Some("/weatherforecast")), "GET /weatherforecast");
        assert_eq!(span_name("POST", None), "POST");
    }

    #[test]
    fn test_unknown_methods_collapse() {
        let custom = Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(method_label(&custom), "_OTHER");
        assert_eq!(method_label(&Method::GET), "GET");
    }

    #[test]
    fn test_transport_spans_are_filtered() {
        assert!(is_transport("hyper_util::client::legacy"));
        assert!(is_transport("opentelemetry_sdk"));
        assert!(!is_transport("forecast_service::observability::sources::http"));
    }

    #[tokio::test]
    async fn test_request_is_recorded_on_the_histogram() {
        let exporter = InMemoryMetricExporter::default();
        let provider = SdkMeterProvider::builder()
            .with_reader(PeriodicReader::builder(exporter.clone()).build())
            .build();
        let instrumentation = Arc::new(HttpInstrumentation::new());
        instrumentation.bind_metrics(&provider.meter(SCOPE));

        let app = Router::new()
            .route("/weatherforecast", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                instrumentation.clone(),
                track_requests,
            ));
        let request = axum::http::Request::get("/weatherforecast")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(instrumentation.active_requests(), 0);

        let flushed = provider.clone();
        tokio::task::spawn_blocking(move || flushed.force_flush())
            .await
            .unwrap()
            .unwrap();
        let exported = exporter.get_finished_metrics().unwrap();
        let names: Vec<String> = exported
            .iter()
            .flat_map(|rm| rm.scope_metrics())
            .flat_map(|sm| sm.metrics())
            .map(|m| m.name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "http.server.request.duration"));
        assert!(names.iter().any(|n| n == "http.server.active_requests"));
    }
}
