//! Forecast service library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::HostService;
pub use lifecycle::Shutdown;
