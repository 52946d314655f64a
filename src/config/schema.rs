//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::observability::signal::SignalKind;

/// Root configuration for the forecast service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Host environment mode.
    pub environment: Environment,

    /// Optional overrides for the reported service identity.
    pub service: ServiceIdentityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Local logging settings.
    pub observability: ObservabilityConfig,

    /// Telemetry export settings.
    pub telemetry: TelemetryConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Host environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => f.write_str("production"),
            Environment::Development => f.write_str("development"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(format!("unknown environment `{}`", other)),
        }
    }
}

/// Overrides for the service identity reported with every signal.
///
/// When unset, the package name and version baked in at build time are used.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceIdentityConfig {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Timeout configuration for the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Local logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "forecast_service=info,tower_http=info".to_string(),
        }
    }
}

/// Telemetry pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Master switch. When false no pipeline is built and no endpoint is required.
    pub enabled: bool,

    /// Export destination shared by all signals.
    pub exporter: ExporterSettings,

    /// Queueing and batching limits.
    pub batch: BatchConfig,

    pub traces: SignalToggle,

    pub metrics: MetricsConfig,

    pub logs: SignalToggle,

    /// Which instrumentation sources are registered.
    pub instrumentation: InstrumentationConfig,

    /// Upper bound for the final flush at shutdown, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exporter: ExporterSettings::default(),
            batch: BatchConfig::default(),
            traces: SignalToggle::default(),
            metrics: MetricsConfig::default(),
            logs: SignalToggle::default(),
            instrumentation: InstrumentationConfig::default(),
            drain_timeout_ms: 5_000,
        }
    }
}

/// Wire protocol used to reach the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Protocol {
    #[serde(rename = "grpc")]
    Grpc,
    #[default]
    #[serde(rename = "http/protobuf", alias = "http-protobuf")]
    HttpProtobuf,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Grpc => f.write_str("grpc"),
            Protocol::HttpProtobuf => f.write_str("http/protobuf"),
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grpc" => Ok(Protocol::Grpc),
            "http/protobuf" | "http-protobuf" => Ok(Protocol::HttpProtobuf),
            other => Err(format!("unsupported OTLP protocol `{}`", other)),
        }
    }
}

/// How per-signal export URIs are derived from the base endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointMode {
    /// Paths from `paths` are resolved against the base endpoint.
    Explicit,
    /// The exporter appends the canonical OTLP path itself.
    SharedDefault,
}

/// Unresolved exporter settings as read from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterSettings {
    /// Collector base endpoint (e.g., "http://localhost:4318").
    pub endpoint: Option<String>,

    pub protocol: Protocol,

    /// Endpoint composition mode. Inferred from `paths` when omitted.
    pub mode: Option<EndpointMode>,

    /// Per-signal path suffixes for the explicit mode.
    pub paths: BTreeMap<SignalKind, String>,

    /// Extra headers sent with every export (e.g., authorization).
    pub headers: BTreeMap<String, String>,

    /// Timeout of a single export attempt in milliseconds.
    pub timeout_ms: u64,

    pub retry: RetryConfig,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            protocol: Protocol::default(),
            mode: None,
            paths: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout_ms: 10_000,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for export attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

/// Queueing and batching limits shared by all pipelines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Signals buffered per pipeline before new ones are dropped.
    pub max_queue_size: usize,

    /// Largest batch handed to the exporter at once.
    pub max_export_batch_size: usize,

    /// Periodic flush interval in milliseconds.
    pub scheduled_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 2_048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalToggle {
    pub enabled: bool,
}

impl Default for SignalToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Collection and export interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 15_000,
        }
    }
}

/// Toggles for the built-in instrumentation sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    pub http: bool,
    pub process: bool,
    pub runtime: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            http: true,
            process: true,
            runtime: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            environment = "development"

            [listener]
            bind_address = "127.0.0.1:5000"

            [telemetry]
            drain_timeout_ms = 1500

            [telemetry.exporter]
            endpoint = "https://collector.example/otlp"
            protocol = "http/protobuf"
            mode = "explicit"

            [telemetry.exporter.paths]
            traces = "/v1/traces"

            [telemetry.exporter.headers]
            authorization = "Bearer abc"

            [telemetry.metrics]
            interval_ms = 1000
        "#;

        let config: ServiceConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.listener.bind_address, "127.0.0.1:5000");
        assert_eq!(config.telemetry.drain_timeout_ms, 1500);
        assert_eq!(config.telemetry.exporter.mode, Some(EndpointMode::Explicit));
        assert_eq!(
            config.telemetry.exporter.paths.get(&SignalKind::Trace).map(String::as_str),
            Some("/v1/traces")
        );
        assert_eq!(config.telemetry.metrics.interval_ms, 1000);
        assert!(config.telemetry.logs.enabled);
    }

    #[test]
    fn test_protocol_aliases() {
        assert_eq!("grpc".parse::<Protocol>(), Ok(Protocol::Grpc));
        assert_eq!("http-protobuf".parse::<Protocol>(), Ok(Protocol::HttpProtobuf));
        assert!("http/json".parse::<Protocol>().is_err());

        let raw = "protocol = \"http-protobuf\"";
        let settings: ExporterSettings = toml::from_str(raw).unwrap();
        assert_eq!(settings.protocol, Protocol::HttpProtobuf);
    }

    #[test]
    fn test_defaults_have_no_endpoint() {
        let config = ServiceConfig::default();
        assert!(config.telemetry.enabled);
        assert!(config.telemetry.exporter.endpoint.is_none());
        assert_eq!(config.environment, Environment::Production);
    }
}
