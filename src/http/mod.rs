//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!         SetRequestId → Trace → PropagateRequestId → Timeout
//!         → observability::sources::http (span + metrics)
//!     → forecast.rs (GET /weatherforecast)
//!     → docs.rs     (GET /openapi.json, development only)
//!     → Send to client
//! ```

pub mod docs;
pub mod forecast;
pub mod server;

pub use server::HostService;
