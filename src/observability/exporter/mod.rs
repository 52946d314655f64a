//! Export destination resolution and the exporter seam.
//!
//! # Data Flow
//! ```text
//! ExporterSettings (config)
//!     → ExporterConfig::resolve (validate endpoint, headers, mode)
//!     → Arc<ExporterConfig> shared by every pipeline
//!     → otlp.rs builds one OTLP exporter per signal kind from signal_endpoint
//!     → retry.rs wraps it with the retry policy
//!     → SDK batch processor / periodic reader drives exports
//! ```
//!
//! # Design Decisions
//! - Resolution happens once at boot; every failure is a configuration error
//! - Explicit per-signal paths and the shared default are mutually exclusive
//! - Paths resolve relative to the base path, which is never clobbered

pub mod client;
pub mod otlp;
pub mod retry;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use opentelemetry_otlp::tonic_types::metadata::MetadataMap;
use url::Url;

use crate::config::{EndpointMode, ExporterSettings, Protocol};
use crate::observability::error::TelemetryError;
use crate::observability::signal::SignalKind;
use crate::resilience::RetryPolicy;

pub use client::RuntimeHttpClient;
pub use otlp::{log_exporter, metric_exporter, span_exporter};
pub use retry::RetryingExporter;

/// How per-signal URIs are derived, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMode {
    /// Path per signal, relative to the base path.
    Explicit(BTreeMap<SignalKind, String>),
    /// Canonical OTLP paths appended by the exporter.
    SharedDefault,
}

/// Validated export destination shared by all pipelines.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    base_endpoint: Url,
    protocol: Protocol,
    headers: HeaderMap,
    mode: ResolvedMode,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ExporterConfig {
    /// Validate raw settings into a usable export destination.
    pub fn resolve(settings: &ExporterSettings) -> Result<Self, TelemetryError> {
        let base_endpoint = parse_endpoint(settings.endpoint.as_deref())?;
        let headers = parse_headers(&settings.headers)?;
        let mode = resolve_mode(settings)?;

        if settings.timeout_ms == 0 {
            return Err(TelemetryError::config("export timeout must be greater than zero"));
        }
        if settings.retry.max_attempts == 0 {
            return Err(TelemetryError::config("retry.max_attempts must be at least 1"));
        }

        Ok(Self {
            base_endpoint,
            protocol: settings.protocol,
            headers,
            mode,
            timeout: Duration::from_millis(settings.timeout_ms),
            retry: RetryPolicy::from(&settings.retry),
        })
    }

    pub fn base_endpoint(&self) -> &Url {
        &self.base_endpoint
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn mode(&self) -> &ResolvedMode {
        &self.mode
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether the collector is reached over TLS.
    pub fn uses_tls(&self) -> bool {
        self.base_endpoint.scheme() == "https"
    }

    /// Headers as owned pairs, for the OTLP/HTTP exporter.
    pub fn header_pairs(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect()
    }

    /// Headers as gRPC metadata, for the OTLP/gRPC exporter.
    pub fn metadata(&self) -> MetadataMap {
        MetadataMap::from_headers(self.headers.clone())
    }

    /// Effective export URI for `kind`.
    ///
    /// For gRPC this is the collector origin; the service method supplies
    /// the path.
    pub fn signal_endpoint(&self, kind: SignalKind) -> Url {
        match (self.protocol, &self.mode) {
            (Protocol::Grpc, _) => {
                let mut url = self.base_endpoint.clone();
                url.set_path("");
                url
            }
            (Protocol::HttpProtobuf, ResolvedMode::Explicit(paths)) => {
                let suffix = paths
                    .get(&kind)
                    .map(String::as_str)
                    .unwrap_or_else(|| kind.canonical_path());
                join_path(&self.base_endpoint, suffix)
            }
            (Protocol::HttpProtobuf, ResolvedMode::SharedDefault) => {
                let canonical = kind.canonical_path();
                let base_path = self.base_endpoint.path().trim_end_matches('/');
                if base_path.ends_with(&format!("/{}", canonical)) {
                    self.base_endpoint.clone()
                } else {
                    join_path(&self.base_endpoint, canonical)
                }
            }
        }
    }
}

fn parse_endpoint(raw: Option<&str>) -> Result<Url, TelemetryError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TelemetryError::config("exporter endpoint is not configured"))?;

    let url = Url::parse(raw).map_err(|e| {
        TelemetryError::config(format!(
            "exporter endpoint `{}` is not an absolute URI: {}",
            raw, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TelemetryError::config(format!(
            "exporter endpoint `{}` must use http or https",
            raw
        )));
    }
    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(TelemetryError::config(format!(
            "exporter endpoint `{}` has no host",
            raw
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(TelemetryError::config(format!(
            "exporter endpoint `{}` must not carry a query or fragment",
            raw
        )));
    }

    Ok(url)
}

fn parse_headers(raw: &BTreeMap<String, String>) -> Result<HeaderMap, TelemetryError> {
    let mut headers = HeaderMap::new();
    for (name, value) in raw {
        let header_name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| {
            TelemetryError::config(format!("`{}` is not a valid header name", name))
        })?;
        let header_value = HeaderValue::from_str(value.trim()).map_err(|_| {
            TelemetryError::config(format!("value of header `{}` is not valid", name))
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn resolve_mode(settings: &ExporterSettings) -> Result<ResolvedMode, TelemetryError> {
    let mode = settings.mode.unwrap_or(if settings.paths.is_empty() {
        EndpointMode::SharedDefault
    } else {
        EndpointMode::Explicit
    });

    match mode {
        EndpointMode::SharedDefault => {
            if !settings.paths.is_empty() {
                return Err(TelemetryError::config(
                    "per-signal paths cannot be combined with the shared-default endpoint mode",
                ));
            }
            Ok(ResolvedMode::SharedDefault)
        }
        EndpointMode::Explicit => {
            if settings.paths.is_empty() {
                return Err(TelemetryError::config(
                    "explicit endpoint mode requires per-signal paths",
                ));
            }
            if settings.protocol == Protocol::Grpc {
                return Err(TelemetryError::config(
                    "per-signal paths require the http/protobuf protocol; gRPC routes by service",
                ));
            }
            let mut paths = BTreeMap::new();
            for (kind, path) in &settings.paths {
                let trimmed = path.trim();
                let has_query = trimmed.contains(|c: char| c == '?' || c == '#');
                if trimmed.trim_matches('/').is_empty() || has_query {
                    return Err(TelemetryError::config(format!(
                        "`{}` is not a valid {} path",
                        path, kind
                    )));
                }
                paths.insert(*kind, trimmed.to_string());
            }
            Ok(ResolvedMode::Explicit(paths))
        }
    }
}

/// Resolve `suffix` under the path of `base`, keeping the base path intact.
fn join_path(base: &Url, suffix: &str) -> Url {
    let mut url = base.clone();
    let base_path = base.path().trim_end_matches('/');
    let suffix = suffix.trim_matches('/');
    url.set_path(&format!("{}/{}", base_path, suffix));
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;

    fn settings(endpoint: &str) -> ExporterSettings {
        ExporterSettings {
            endpoint: Some(endpoint.to_string()),
            ..ExporterSettings::default()
        }
    }

    fn explicit(endpoint: &str, paths: &[(SignalKind, &str)]) -> ExporterSettings {
        ExporterSettings {
            mode: Some(EndpointMode::Explicit),
            paths: paths.iter().map(|(k, p)| (*k, p.to_string())).collect(),
            ..settings(endpoint)
        }
    }

    #[test]
    fn test_explicit_path_keeps_base_path() {
        let raw = explicit(
            "https://collector.example/otlp",
            &[(SignalKind::Trace, "/v1/traces")],
        );
        let config = ExporterConfig::resolve(&raw).unwrap();

        assert_eq!(
            config.signal_endpoint(SignalKind::Trace).as_str(),
            "https://collector.example/otlp/v1/traces"
        );
        // Signals missing from the map use their canonical path.
        assert_eq!(
            config.signal_endpoint(SignalKind::Metric).as_str(),
            "https://collector.example/otlp/v1/metrics"
        );
    }

    #[test]
    fn test_explicit_path_tolerates_trailing_slashes() {
        let raw = explicit(
            "https://collector.example/otlp/",
            &[(SignalKind::Log, "v1/logs/")],
        );
        let config = ExporterConfig::resolve(&raw).unwrap();
        assert_eq!(
            config.signal_endpoint(SignalKind::Log).as_str(),
            "https://collector.example/otlp/v1/logs"
        );
    }

    #[test]
    fn test_shared_default_appends_canonical_path_once() {
        let root = ExporterConfig::resolve(&settings("http://localhost:4318")).unwrap();
        assert_eq!(root.mode(), &ResolvedMode::SharedDefault);
        assert_eq!(
            root.signal_endpoint(SignalKind::Metric).as_str(),
            "http://localhost:4318/v1/metrics"
        );

        let already =
            ExporterConfig::resolve(&settings("http://localhost:4318/otlp/v1/traces")).unwrap();
        assert_eq!(
            already.signal_endpoint(SignalKind::Trace).as_str(),
            "http://localhost:4318/otlp/v1/traces"
        );
    }

    #[test]
    fn test_grpc_uses_origin() {
        let config = ExporterConfig::resolve(&ExporterSettings {
            protocol: Protocol::Grpc,
            ..settings("http://collector:4317")
        })
        .unwrap();
        assert_eq!(
            config.signal_endpoint(SignalKind::Log).as_str(),
            "http://collector:4317/"
        );
        assert!(!config.uses_tls());
    }

    #[test]
    fn test_missing_or_malformed_endpoint_is_rejected() {
        let endpoints = [
            None,
            Some(""),
            Some("   "),
            Some("collector:4318"),
            Some("/v1/traces"),
            Some("ftp://collector"),
            Some("http://collector:4318/?x=1"),
        ];
        for endpoint in endpoints {
            let raw = ExporterSettings {
                endpoint: endpoint.map(str::to_string),
                ..ExporterSettings::default()
            };
            let err = ExporterConfig::resolve(&raw).unwrap_err();
            assert!(
                matches!(err, TelemetryError::Configuration(_)),
                "accepted {endpoint:?}"
            );
        }
    }

    #[test]
    fn test_mixed_modes_are_rejected() {
        let mixed = ExporterSettings {
            mode: Some(EndpointMode::SharedDefault),
            ..explicit("http://localhost:4318", &[(SignalKind::Trace, "/v1/traces")])
        };
        assert!(matches!(
            ExporterConfig::resolve(&mixed),
            Err(TelemetryError::Configuration(_))
        ));

        let empty_explicit = explicit("http://localhost:4318", &[]);
        assert!(ExporterConfig::resolve(&empty_explicit).is_err());

        let grpc_paths = ExporterSettings {
            protocol: Protocol::Grpc,
            ..explicit("http://localhost:4317", &[(SignalKind::Trace, "/v1/traces")])
        };
        assert!(ExporterConfig::resolve(&grpc_paths).is_err());
    }

    #[test]
    fn test_mode_is_inferred_from_paths() {
        let inferred = ExporterSettings {
            mode: None,
            ..explicit("http://localhost:4318", &[(SignalKind::Trace, "/custom/traces")])
        };
        let config = ExporterConfig::resolve(&inferred).unwrap();
        assert!(matches!(config.mode(), ResolvedMode::Explicit(_)));
        assert_eq!(
            config.signal_endpoint(SignalKind::Trace).as_str(),
            "http://localhost:4318/custom/traces"
        );
    }

    #[test]
    fn test_invalid_headers_and_limits_are_rejected() {
        let mut bad_header = settings("http://localhost:4318");
        bad_header.headers.insert("bad header".into(), "x".into());
        assert!(ExporterConfig::resolve(&bad_header).is_err());

        let zero_timeout = ExporterSettings {
            timeout_ms: 0,
            ..settings("http://localhost:4318")
        };
        assert!(ExporterConfig::resolve(&zero_timeout).is_err());

        let zero_attempts = ExporterSettings {
            retry: RetryConfig {
                max_attempts: 0,
                ..RetryConfig::default()
            },
            ..settings("http://localhost:4318")
        };
        assert!(ExporterConfig::resolve(&zero_attempts).is_err());
    }

    #[test]
    fn test_headers_are_kept() {
        let mut raw = settings("http://localhost:4318");
        raw.headers.insert("Authorization".into(), "Bearer token".into());
        let config = ExporterConfig::resolve(&raw).unwrap();
        assert_eq!(
            config.headers().get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer token")
        );
        assert_eq!(
            config.header_pairs().get("authorization").map(String::as_str),
            Some("Bearer token")
        );
        assert_eq!(
            config.metadata().get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer token")
        );
    }
}
