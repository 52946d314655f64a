//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::config::schema::{Environment, Protocol, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the standard OTLP environment variables on top of `config`.
///
/// Header values in `OTEL_EXPORTER_OTLP_HEADERS` are percent-decoded.
pub fn apply_env_overrides(config: &mut ServiceConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Same as [`apply_env_overrides`], reading variables through `lookup`.
pub fn apply_overrides_from<F>(config: &mut ServiceConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.exporter.endpoint = Some(endpoint.trim().to_string());
    }

    if let Some(raw) = lookup("OTEL_EXPORTER_OTLP_PROTOCOL") {
        config.telemetry.exporter.protocol = raw
            .parse::<Protocol>()
            .map_err(|message| ConfigError::Env {
                var: "OTEL_EXPORTER_OTLP_PROTOCOL",
                message,
            })?;
    }

    if let Some(raw) = lookup("OTEL_EXPORTER_OTLP_HEADERS") {
        for pair in raw.split(',').filter(|p| !p.trim().is_empty()) {
            let (name, value) = pair.split_once('=').ok_or_else(|| ConfigError::Env {
                var: "OTEL_EXPORTER_OTLP_HEADERS",
                message: format!("`{}` is not a key=value pair", pair.trim()),
            })?;
            let value = percent_decode_str(value.trim())
                .decode_utf8()
                .map_err(|e| ConfigError::Env {
                    var: "OTEL_EXPORTER_OTLP_HEADERS",
                    message: format!("`{}` is not valid UTF-8 once decoded: {}", name.trim(), e),
                })?;
            config
                .telemetry
                .exporter
                .headers
                .insert(name.trim().to_string(), value.into_owned());
        }
    }

    if let Some(name) = lookup("OTEL_SERVICE_NAME") {
        config.service.name = Some(name.trim().to_string());
    }

    if let Some(raw) = lookup("FORECAST_ENVIRONMENT") {
        config.environment = raw
            .parse::<Environment>()
            .map_err(|message| ConfigError::Env {
                var: "FORECAST_ENVIRONMENT",
                message,
            })?;
    }

    Ok(())
}
