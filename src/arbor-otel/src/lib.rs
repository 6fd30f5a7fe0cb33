//! arbor OpenTelemetry - span capability for command invocations.
//!
//! The dispatch pipeline only sees [`Tracer`] and [`CommandSpan`]. Without the
//! `otel` feature spans are plain `tracing` spans; with it, and an endpoint
//! configured, they are exported over OTLP.

use std::sync::Arc;

pub mod config;
pub mod span;

#[cfg(feature = "otel")]
pub mod otel_provider;

pub use config::OtelSettings;
pub use span::{CommandSpan, MemoryTracer, SpanEvent, Tracer, TracingTracer};

#[cfg(feature = "otel")]
pub use otel_provider::{OtelProvider, OtelTracer};

/// Build the tracer described by `settings`.
///
/// Falls back to [`TracingTracer`] when export is disabled, unconfigured, or
/// the exporter cannot be built.
pub fn build_tracer(settings: &OtelSettings) -> Arc<dyn Tracer> {
    otel_tracer(settings).unwrap_or_else(|| Arc::new(TracingTracer::new()))
}

#[cfg(feature = "otel")]
fn otel_tracer(settings: &OtelSettings) -> Option<Arc<dyn Tracer>> {
    let provider = OtelProvider::from(settings)?;
    Some(Arc::new(OtelTracer::new(provider)))
}

#[cfg(not(feature = "otel"))]
fn otel_tracer(settings: &OtelSettings) -> Option<Arc<dyn Tracer>> {
    if settings.should_initialize() {
        tracing::debug!("OTLP endpoint configured but the otel feature is disabled");
    }
    None
}
