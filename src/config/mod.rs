//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → loader.rs (OTEL_* environment overrides)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once at boot by lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The exporter endpoint is resolved by the telemetry layer, not here

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, load_config, ConfigError};
pub use schema::{
    BatchConfig, EndpointMode, Environment, ExporterSettings, ListenerConfig, Protocol,
    RetryConfig, ServiceConfig, TelemetryConfig,
};
