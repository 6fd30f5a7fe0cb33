//! OpenTelemetry provider and OTLP-backed command tracer.

use std::sync::Arc;

use opentelemetry::KeyValue;
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer as _, TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use parking_lot::Mutex;

use crate::config::OtelSettings;
use crate::span::{CommandSpan, Tracer};

/// OpenTelemetry provider for arbor commands.
pub struct OtelProvider {
    tracer_provider: SdkTracerProvider,
}

impl OtelProvider {
    /// Create a new provider from settings.
    ///
    /// Returns `None` when export is disabled or the exporter cannot be built.
    pub fn from(settings: &OtelSettings) -> Option<Self> {
        if !settings.should_initialize() {
            return None;
        }

        let endpoint = traces_url(settings.endpoint.as_ref()?);

        let mut attrs = vec![KeyValue::new(SERVICE_NAME, settings.service_name.clone())];
        if let Some(version) = &settings.service_version {
            attrs.push(KeyValue::new(SERVICE_VERSION, version.clone()));
        }

        let resource = Resource::builder_empty().with_attributes(attrs).build();

        let sampler = match settings.sampling_ratio {
            ratio if ratio >= 1.0 => Sampler::AlwaysOn,
            ratio if ratio <= 0.0 => Sampler::AlwaysOff,
            ratio => Sampler::TraceIdRatioBased(ratio),
        };

        let exporter = match opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(&endpoint)
            .with_timeout(std::time::Duration::from_secs(settings.export_timeout_secs))
            .build()
        {
            Ok(exporter) => exporter,
            Err(e) => {
                tracing::warn!("failed to build OTLP exporter for {endpoint}: {e}");
                return None;
            }
        };

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_sampler(sampler)
            .with_batch_exporter(exporter)
            .build();

        Some(Self { tracer_provider })
    }

    /// Get a tracer from this provider.
    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        self.tracer_provider.tracer(name)
    }

    /// Export every finished span now.
    pub fn force_flush(&self) {
        if let Err(e) = self.tracer_provider.force_flush() {
            tracing::warn!("failed to flush tracer provider: {e}");
        }
    }

    /// Shutdown the provider and flush any pending spans.
    pub fn shutdown(&self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!("failed to shutdown tracer provider: {e}");
        }
    }
}

/// OTLP/HTTP traces URL for a collector base URL. A URL that already names
/// the traces path is kept.
fn traces_url(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/v1/traces") {
        base.to_string()
    } else {
        format!("{base}/v1/traces")
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// [`Tracer`] exporting one OTLP span per command invocation.
///
/// Owns the provider, so dropping the tracer flushes pending spans.
pub struct OtelTracer {
    tracer: opentelemetry_sdk::trace::Tracer,
    provider: OtelProvider,
}

impl OtelTracer {
    pub fn new(provider: OtelProvider) -> Self {
        Self {
            tracer: provider.tracer("arbor"),
            provider,
        }
    }
}

impl Tracer for OtelTracer {
    fn start_span(&self, name: &str) -> Arc<dyn CommandSpan> {
        let span = self
            .tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Internal)
            .start(&self.tracer);
        Arc::new(OtelCommandSpan {
            inner: Mutex::new(span),
            ended: Mutex::new(false),
        })
    }

    fn flush(&self) {
        self.provider.force_flush();
    }
}

struct OtelCommandSpan {
    inner: Mutex<opentelemetry_sdk::trace::Span>,
    ended: Mutex<bool>,
}

impl CommandSpan for OtelCommandSpan {
    fn set_attribute(&self, key: &str, value: &str) {
        self.inner
            .lock()
            .set_attribute(KeyValue::new(key.to_string(), value.to_string()));
    }

    fn mark_ok(&self) {
        self.inner.lock().set_status(Status::Ok);
    }

    fn mark_failed(&self, description: &str) {
        self.inner
            .lock()
            .set_status(Status::error(description.to_string()));
    }

    fn end(&self) {
        let mut ended = self.ended.lock();
        if !*ended {
            *ended = true;
            self.inner.lock().end();
        }
    }
}
