//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the forecast route
//! - Serve the API description in development
//! - Wire up middleware (instrumentation, timeout, request ID, tracing)
//! - Serve until shutdown, then drain telemetry within a deadline

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::http::{docs, forecast};
use crate::observability::sources::{track_requests, HttpInstrumentation};
use crate::observability::{Instrumentation, Telemetry};

pub const FORECAST_PATH: &str = "/weatherforecast";

/// The HTTP service. Owns the telemetry pipelines for their whole lifetime.
pub struct HostService {
    router: Router,
    config: ServiceConfig,
    telemetry: Telemetry,
}

impl HostService {
    pub fn new(
        config: ServiceConfig,
        telemetry: Telemetry,
        instrumentation: &Instrumentation,
    ) -> Self {
        let router = Self::build_router(&config, instrumentation.http());
        Self {
            router,
            config,
            telemetry,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, http: Arc<HttpInstrumentation>) -> Router {
        let mut router = Router::new().route(FORECAST_PATH, get(forecast::get_weather_forecast));
        if config.environment.is_development() {
            router = router.route(docs::OPENAPI_PATH, get(docs::openapi));
        }

        router
            .layer(middleware::from_fn_with_state(http, track_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain telemetry.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let Self {
            router,
            config,
            telemetry,
        } = self;

        let serving = async move {
            let addr = listener.local_addr()?;
            tracing::info!(
                address = %addr,
                environment = %config.environment,
                "HTTP server starting"
            );
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Stopping listener, draining in-flight requests");
                })
                .await
        };

        let drain_timeout = Duration::from_millis(config.telemetry.drain_timeout_ms);
        drain_after(serving, &telemetry, drain_timeout).await
    }
}

/// Await `serving`, then drain `telemetry` whatever the serve result was.
async fn drain_after<F>(
    serving: F,
    telemetry: &Telemetry,
    drain_timeout: Duration,
) -> Result<(), std::io::Error>
where
    F: Future<Output = Result<(), std::io::Error>>,
{
    let served = serving.await;
    match &served {
        Ok(()) => tracing::info!("HTTP server stopped"),
        Err(e) => tracing::error!(error = %e, "HTTP server failed"),
    }

    telemetry.shutdown(drain_timeout).await;
    served
}

#[cfg(test)]
mod tests {
    use opentelemetry_sdk::error::OTelSdkError;

    use super::*;
    use crate::observability::{
        compose, SignalKind, SignalProvider, TelemetryContext, TelemetryPlan,
    };

    #[tokio::test]
    async fn test_serve_failure_still_drains_telemetry() {
        let mut config = ServiceConfig::default();
        config.telemetry.exporter.endpoint = Some("http://127.0.0.1:9".into());
        let context = TelemetryContext::from_config(&config).unwrap();
        let telemetry = compose(
            &context,
            TelemetryPlan {
                traces: Some(Vec::new()),
                ..TelemetryPlan::default()
            },
        )
        .unwrap();
        let traces = telemetry.pipeline(SignalKind::Trace).cloned().unwrap();

        let serving = async { Err(std::io::Error::other("accept loop failed")) };
        let err = drain_after(serving, &telemetry, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "accept loop failed");

        let SignalProvider::Traces(provider) = traces.provider() else {
            panic!("trace pipeline holds a tracer provider");
        };
        assert!(matches!(provider.shutdown(), Err(OTelSdkError::AlreadyShutdown)));
    }
}
