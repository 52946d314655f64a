//! Telemetry error types.

use opentelemetry_sdk::error::OTelSdkError;
use thiserror::Error;
use tonic::Code;

use crate::observability::signal::SignalKind;
use crate::resilience::{is_retryable_status, Retryable};

/// Errors raised while composing telemetry pipelines at boot.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Missing or malformed exporter configuration. Fatal at boot.
    #[error("telemetry configuration error: {0}")]
    Configuration(String),

    /// A source was registered into a pipeline it cannot feed. Wiring bug.
    #[error("instrumentation source `{source_name}` does not emit {kind}")]
    UnsupportedSource {
        source_name: &'static str,
        kind: SignalKind,
    },

    /// `attach` was called twice on the same pipeline builder. Wiring bug.
    #[error("{kind} pipeline already has an exporter attached")]
    AlreadyAttached { kind: SignalKind },

    /// The exporter transport could not be constructed.
    #[error("failed to initialize {kind} exporter: {reason}")]
    ExporterInit { kind: SignalKind, reason: String },
}

impl TelemetryError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        TelemetryError::Configuration(message.into())
    }

    pub(crate) fn exporter_init(kind: SignalKind, reason: impl ToString) -> Self {
        TelemetryError::ExporterInit {
            kind,
            reason: reason.to_string(),
        }
    }

    /// Whether boot must abort on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TelemetryError::ExporterInit { .. })
    }
}

/// Failure of a single export attempt, classified from the SDK exporter error.
///
/// The OTLP exporters report collector rejections as free-form
/// `InternalFailure` text; HTTP failures carry `Status Code: N` and gRPC
/// failures carry the tonic status rendering `code: '<description>'`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportTransportError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("export attempt timed out")]
    Timeout,

    #[error("exporter already shut down")]
    Closed,

    #[error("collector responded with HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("collector responded with gRPC status {code:?}: {message}")]
    GrpcStatus { code: Code, message: String },
}

impl From<OTelSdkError> for ExportTransportError {
    fn from(err: OTelSdkError) -> Self {
        match err {
            OTelSdkError::Timeout(_) => ExportTransportError::Timeout,
            OTelSdkError::AlreadyShutdown => ExportTransportError::Closed,
            OTelSdkError::InternalFailure(message) => {
                if let Some(status) = http_status(&message) {
                    ExportTransportError::HttpStatus { status, message }
                } else if let Some(code) = grpc_code(&message) {
                    ExportTransportError::GrpcStatus { code, message }
                } else {
                    ExportTransportError::Transport(message)
                }
            }
        }
    }
}

impl From<ExportTransportError> for OTelSdkError {
    fn from(err: ExportTransportError) -> Self {
        match err {
            ExportTransportError::Closed => OTelSdkError::AlreadyShutdown,
            other => OTelSdkError::InternalFailure(other.to_string()),
        }
    }
}

impl Retryable for ExportTransportError {
    fn is_retryable(&self) -> bool {
        match self {
            ExportTransportError::Transport(_) | ExportTransportError::Timeout => true,
            ExportTransportError::Closed => false,
            ExportTransportError::HttpStatus { status, .. } => is_retryable_status(*status),
            ExportTransportError::GrpcStatus { code, .. } => matches!(
                code,
                Code::Cancelled
                    | Code::DeadlineExceeded
                    | Code::ResourceExhausted
                    | Code::Aborted
                    | Code::OutOfRange
                    | Code::Unavailable
                    | Code::DataLoss
            ),
        }
    }
}

fn http_status(message: &str) -> Option<u16> {
    let (_, rest) = message.split_once("Status Code: ")?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

const GRPC_CODES: [Code; 16] = [
    Code::Cancelled,
    Code::Unknown,
    Code::InvalidArgument,
    Code::DeadlineExceeded,
    Code::NotFound,
    Code::AlreadyExists,
    Code::PermissionDenied,
    Code::ResourceExhausted,
    Code::FailedPrecondition,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unimplemented,
    Code::Internal,
    Code::Unavailable,
    Code::DataLoss,
    Code::Unauthenticated,
];

fn grpc_code(message: &str) -> Option<Code> {
    let rest = message.strip_prefix("code: '")?;
    let (description, _) = rest.split_once('\'')?;
    GRPC_CODES
        .into_iter()
        .find(|code| code.description() == description)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn classify(message: &str) -> ExportTransportError {
        OTelSdkError::InternalFailure(message.to_string()).into()
    }

    #[test]
    fn test_fatality() {
        assert!(TelemetryError::config("missing endpoint").is_fatal());
        assert!(TelemetryError::AlreadyAttached { kind: SignalKind::Log }.is_fatal());
        assert!(!TelemetryError::exporter_init(SignalKind::Trace, "no runtime").is_fatal());
    }

    #[test]
    fn test_http_rejections() {
        let unavailable = classify(
            "OpenTelemetry logs export failed. Url: http://c/v1/logs, \
             Status Code: 503, Response: b\"\"",
        );
        assert!(matches!(
            unavailable,
            ExportTransportError::HttpStatus { status: 503, .. }
        ));
        assert!(unavailable.is_retryable());

        let bad_request =
            classify("OpenTelemetry metrics export failed. Status Code: 400, Response: b\"\"");
        assert!(!bad_request.is_retryable());
    }

    #[test]
    fn test_grpc_rejections() {
        let unavailable = tonic::Status::unavailable("collector restarting").to_string();
        let err = classify(&unavailable);
        assert!(matches!(
            err,
            ExportTransportError::GrpcStatus { code: Code::Unavailable, .. }
        ));
        assert!(err.is_retryable());

        let invalid = tonic::Status::invalid_argument("bad payload").to_string();
        assert!(!classify(&invalid).is_retryable());
    }

    #[test]
    fn test_transport_and_lifecycle_failures() {
        let refused = classify("reqwest::Error { kind: Request, source: ConnectionRefused }");
        assert!(matches!(refused, ExportTransportError::Transport(_)));
        assert!(refused.is_retryable());

        let timed_out: ExportTransportError = OTelSdkError::Timeout(Duration::from_secs(1)).into();
        assert!(timed_out.is_retryable());

        let closed: ExportTransportError = OTelSdkError::AlreadyShutdown.into();
        assert!(!closed.is_retryable());
        assert!(matches!(OTelSdkError::from(closed), OTelSdkError::AlreadyShutdown));
    }

    #[test]
    fn test_messages_name_the_signal() {
        let err = TelemetryError::UnsupportedSource {
            source_name: "process",
            kind: SignalKind::Trace,
        };
        assert_eq!(
            err.to_string(),
            "instrumentation source `process` does not emit traces"
        );
    }
}
