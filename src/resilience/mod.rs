//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Export of a telemetry batch:
//!     → exporter attempt (bounded by the export timeout)
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (exponential delay + jitter, capped)
//!     → budget exhausted: batch dropped, warning logged
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Retries are bounded; telemetry is best-effort
//! - Jittered backoff prevents synchronized retry storms against the collector

pub mod backoff;
pub mod retries;

pub use backoff::{calculate_backoff, RetryPolicy};
pub use retries::{is_retryable_status, retry_with_backoff, Retryable};
