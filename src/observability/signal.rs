//! The three telemetry signal families.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum SignalKind {
    #[serde(rename = "traces")]
    Trace,
    #[serde(rename = "metrics")]
    Metric,
    #[serde(rename = "logs")]
    Log,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Trace, SignalKind::Metric, SignalKind::Log];

    /// Canonical OTLP/HTTP path, relative to the collector base.
    pub fn canonical_path(self) -> &'static str {
        match self {
            SignalKind::Trace => "v1/traces",
            SignalKind::Metric => "v1/metrics",
            SignalKind::Log => "v1/logs",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Trace => "traces",
            SignalKind::Metric => "metrics",
            SignalKind::Log => "logs",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
