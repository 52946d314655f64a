//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the telemetry context (exporter config, then resource identity)
//! - Decide which pipelines run and which sources feed them
//! - Compose the pipelines before any listener is bound
//!
//! # Design Decisions
//! - Fail fast: configuration and wiring errors are fatal
//! - A pipeline whose exporter cannot start is skipped, not fatal
//! - Listeners start last (traffic only when telemetry is ready)

use crate::config::{ServiceConfig, TelemetryConfig};
use crate::observability::{
    compose, Instrumentation, InstrumentationSource, Telemetry, TelemetryContext, TelemetryError,
    TelemetryPlan,
};

/// Build the telemetry pipelines for `config`.
///
/// Must run inside a Tokio runtime; otherwise every pipeline is skipped.
pub fn boot(
    config: &ServiceConfig,
    instrumentation: &Instrumentation,
) -> Result<Telemetry, TelemetryError> {
    if !config.telemetry.enabled {
        tracing::info!("Telemetry export disabled");
        return Ok(Telemetry::disabled());
    }

    let context = TelemetryContext::from_config(config)?;
    let resource = context.resource();
    tracing::info!(
        service_name = %resource.service_name(),
        namespace = %resource.namespace(),
        version = %resource.version(),
        instance_id = %resource.instance_id(),
        endpoint = %context.exporter().base_endpoint(),
        protocol = %context.exporter().protocol(),
        "Telemetry context resolved"
    );

    let telemetry = compose(&context, plan(&config.telemetry, instrumentation))?;
    tracing::info!(pipelines = ?telemetry.active_pipelines(), "Telemetry ready");
    Ok(telemetry)
}

/// Map the configuration toggles to a composition plan.
pub fn plan(config: &TelemetryConfig, instrumentation: &Instrumentation) -> TelemetryPlan {
    let toggles = &config.instrumentation;

    let traces = config.traces.enabled.then(|| {
        let mut sources = Vec::new();
        if toggles.http {
            sources.push(instrumentation.http_source());
        }
        sources
    });

    let metrics = config.metrics.enabled.then(|| {
        let mut sources = Vec::new();
        if toggles.http {
            sources.push(instrumentation.http_source());
        }
        if toggles.process {
            sources.push(InstrumentationSource::Process);
        }
        if toggles.runtime {
            sources.push(InstrumentationSource::Runtime);
        }
        sources
    });

    let logs = config
        .logs
        .enabled
        .then(|| vec![instrumentation.log_source()]);

    TelemetryPlan {
        traces,
        metrics,
        logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sources: &Option<Vec<InstrumentationSource>>) -> Option<Vec<&'static str>> {
        sources
            .as_ref()
            .map(|s| s.iter().map(InstrumentationSource::name).collect())
    }

    #[test]
    fn test_default_plan() {
        let plan = plan(&TelemetryConfig::default(), &Instrumentation::new());
        assert_eq!(names(&plan.traces), Some(vec!["http-server"]));
        assert_eq!(names(&plan.metrics), Some(vec!["http-server", "process", "runtime"]));
        assert_eq!(names(&plan.logs), Some(vec!["log-bridge"]));
    }

    #[test]
    fn test_toggles_shape_the_plan() {
        let mut config = TelemetryConfig::default();
        config.logs.enabled = false;
        config.instrumentation.process = false;
        config.instrumentation.runtime = false;

        let plan = plan(&config, &Instrumentation::new());
        assert_eq!(names(&plan.metrics), Some(vec!["http-server"]));
        assert!(plan.logs.is_none());
    }

    #[test]
    fn test_disabled_telemetry_needs_no_endpoint() {
        let mut config = ServiceConfig::default();
        config.telemetry.enabled = false;

        let telemetry = boot(&config, &Instrumentation::new()).unwrap();
        assert!(telemetry.active_pipelines().is_empty());
    }

    #[test]
    fn test_missing_endpoint_fails_boot() {
        let err = boot(&ServiceConfig::default(), &Instrumentation::new()).unwrap_err();
        assert!(matches!(err, TelemetryError::Configuration(_)));
    }
}
