//! Service resource identity.
//!
//! One [`ResourceIdentity`] is built per process and shared by every
//! pipeline; each build mints a new instance id, so building twice would make
//! signals from the same process look like they came from two instances.

use std::fmt;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use serde::Serialize;
use uuid::Uuid;

pub const UNKNOWN_SERVICE: &str = "unknown-service";
pub const UNKNOWN_VERSION: &str = "0.0.0";

const SDK_NAME: &str = "forecast-service";

/// Deployment namespace derived from the host environment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Production,
    Development,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Production => "production",
            Namespace::Development => "development",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attributes attached to every exported signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    service_name: String,
    namespace: Namespace,
    version: String,
    instance_id: String,
}

impl ResourceIdentity {
    /// Build an identity, falling back to defaults for absent or blank inputs.
    pub fn build(
        service_name: Option<&str>,
        is_production: bool,
        version: Option<&str>,
    ) -> Self {
        let non_blank = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };

        Self {
            service_name: non_blank(service_name)
                .unwrap_or_else(|| UNKNOWN_SERVICE.to_string()),
            namespace: if is_production {
                Namespace::Production
            } else {
                Namespace::Development
            },
            version: non_blank(version).unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// OTLP resource attributes, in a stable order.
    pub fn attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.namespace", self.namespace.as_str()),
            KeyValue::new("service.version", self.version.clone()),
            KeyValue::new("service.instance.id", self.instance_id.clone()),
            KeyValue::new("telemetry.sdk.name", SDK_NAME),
            KeyValue::new("telemetry.sdk.language", "rust"),
            KeyValue::new("telemetry.sdk.version", env!("CARGO_PKG_VERSION")),
        ]
    }

    /// SDK resource carrying exactly these attributes. Environment detectors
    /// are skipped so every pipeline reports the same identity.
    pub fn to_resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(self.attributes())
            .build()
    }
}
