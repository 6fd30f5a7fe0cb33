//! Settings for the per-run tracer.

use serde::{Deserialize, Serialize};

const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const SERVICE_NAME_VAR: &str = "OTEL_SERVICE_NAME";
const SAMPLER_ARG_VAR: &str = "OTEL_TRACES_SAMPLER_ARG";

/// Where and how command spans are exported.
///
/// Export happens only when `enabled` is set and an endpoint is known;
/// [`OtelSettings::with_endpoint`] does both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtelSettings {
    pub enabled: bool,
    /// OTLP/HTTP collector base URL.
    pub endpoint: Option<String>,
    pub service_name: String,
    pub service_version: Option<String>,
    /// Fraction of runs exported. Values outside 0.0..=1.0 are clamped.
    pub sampling_ratio: f64,
    pub export_timeout_secs: u64,
}

impl Default for OtelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: "arbor".to_string(),
            service_version: None,
            sampling_ratio: 1.0,
            export_timeout_secs: 30,
        }
    }
}

impl OtelSettings {
    /// Settings from the standard `OTEL_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Settings from `lookup`, which maps an `OTEL_*` variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(endpoint) = lookup(ENDPOINT_VAR) {
            settings = settings.with_endpoint(endpoint);
        }
        if let Some(name) = lookup(SERVICE_NAME_VAR) {
            settings.service_name = name;
        }
        if let Some(ratio) = lookup(SAMPLER_ARG_VAR).and_then(|v| v.parse::<f64>().ok()) {
            settings.sampling_ratio = ratio.clamp(0.0, 1.0);
        }
        settings
    }

    /// Name and version the exported resource reports.
    pub fn with_service(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.service_name = name.into();
        self.service_version = Some(version.into());
        self
    }

    /// Export to `endpoint`, as requested by `--trace-endpoint`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.enabled = true;
        self
    }

    pub fn should_initialize(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }
}
