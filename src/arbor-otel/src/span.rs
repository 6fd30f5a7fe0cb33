//! Span capability handed to the dispatch pipeline.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::field::Empty;

/// Handle for one command invocation's span.
///
/// `end` may be called more than once; only the first call has an effect.
pub trait CommandSpan: Send + Sync {
    /// Attach a key/value attribute.
    fn set_attribute(&self, key: &str, value: &str);

    /// Mark the invocation as successful.
    fn mark_ok(&self);

    /// Mark the invocation as failed with a description.
    fn mark_failed(&self, description: &str);

    /// Close the span.
    fn end(&self);

    /// `tracing` span that work done inside the invocation should run under.
    fn tracing_span(&self) -> tracing::Span {
        tracing::Span::none()
    }
}

/// Factory for command spans.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str) -> Arc<dyn CommandSpan>;

    /// Push finished spans to their destination.
    fn flush(&self) {}
}

/// Tracer backed by `tracing` spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl TracingTracer {
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, name: &str) -> Arc<dyn CommandSpan> {
        let span = tracing::info_span!("command", command = %name, status = Empty, error = Empty);
        Arc::new(TracingSpan {
            name: name.to_string(),
            started: Instant::now(),
            span: Mutex::new(Some(span)),
        })
    }
}

struct TracingSpan {
    name: String,
    started: Instant,
    span: Mutex<Option<tracing::Span>>,
}

impl CommandSpan for TracingSpan {
    fn set_attribute(&self, key: &str, value: &str) {
        if let Some(span) = self.span.lock().as_ref() {
            span.in_scope(|| tracing::debug!(key, value, "span attribute"));
        }
    }

    fn mark_ok(&self) {
        if let Some(span) = self.span.lock().as_ref() {
            span.record("status", "ok");
        }
    }

    fn mark_failed(&self, description: &str) {
        if let Some(span) = self.span.lock().as_ref() {
            span.record("status", "error");
            span.record("error", description);
        }
    }

    fn tracing_span(&self) -> tracing::Span {
        self.span.lock().clone().unwrap_or_else(tracing::Span::none)
    }

    fn end(&self) {
        if let Some(span) = self.span.lock().take() {
            span.in_scope(|| {
                tracing::debug!(
                    "Command '{}' finished in {}ms",
                    self.name,
                    self.started.elapsed().as_millis()
                )
            });
        }
    }
}

/// Span lifecycle event recorded by [`MemoryTracer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanEvent {
    Started(String),
    Attribute {
        span: String,
        key: String,
        value: String,
    },
    Ok(String),
    Failed {
        span: String,
        description: String,
    },
    Ended(String),
}

/// Tracer that records span events in memory, for tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct MemoryTracer {
    events: Arc<Mutex<Vec<SpanEvent>>>,
}

impl MemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event recorded so far.
    pub fn events(&self) -> Vec<SpanEvent> {
        self.events.lock().clone()
    }

    /// Count of `Ended` events.
    pub fn ended_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SpanEvent::Ended(_)))
            .count()
    }
}

impl Tracer for MemoryTracer {
    fn start_span(&self, name: &str) -> Arc<dyn CommandSpan> {
        self.events.lock().push(SpanEvent::Started(name.to_string()));
        Arc::new(MemorySpan {
            name: name.to_string(),
            events: Arc::clone(&self.events),
            ended: Mutex::new(false),
        })
    }
}

struct MemorySpan {
    name: String,
    events: Arc<Mutex<Vec<SpanEvent>>>,
    ended: Mutex<bool>,
}

impl CommandSpan for MemorySpan {
    fn set_attribute(&self, key: &str, value: &str) {
        self.events.lock().push(SpanEvent::Attribute {
            span: self.name.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    fn mark_ok(&self) {
        self.events.lock().push(SpanEvent::Ok(self.name.clone()));
    }

    fn mark_failed(&self, description: &str) {
        self.events.lock().push(SpanEvent::Failed {
            span: self.name.clone(),
            description: description.to_string(),
        });
    }

    fn end(&self) {
        let mut ended = self.ended.lock();
        if !*ended {
            *ended = true;
            self.events.lock().push(SpanEvent::Ended(self.name.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_tracer_records_lifecycle() {
        let tracer = MemoryTracer::new();
        let span = tracer.start_span("user add");
        span.set_attribute("user", "alice");
        span.mark_ok();
        span.end();
        span.end();

        assert_eq!(
            tracer.events(),
            vec![
                SpanEvent::Started("user add".to_string()),
                SpanEvent::Attribute {
                    span: "user add".to_string(),
                    key: "user".to_string(),
                    value: "alice".to_string(),
                },
                SpanEvent::Ok("user add".to_string()),
                SpanEvent::Ended("user add".to_string()),
            ]
        );
        assert_eq!(tracer.ended_count(), 1);
    }

    #[test]
    fn test_tracing_span_can_be_entered() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = TracingTracer::new().start_span("greet");
            let inner = span.tracing_span();
            assert!(!inner.is_none());

            let _entered = inner.enter();
            assert_eq!(tracing::Span::current().id(), inner.id());
            assert_eq!(
                tracing::Span::current().metadata().map(|m| m.name()),
                Some("command")
            );
        });
    }

    #[test]
    fn test_ended_span_detaches() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = TracingTracer::new().start_span("greet");
            span.end();
            assert!(span.tracing_span().is_none());
        });
    }

    #[test]
    fn test_tracing_span_end_is_idempotent() {
        let span = TracingTracer::new().start_span("root");
        span.mark_failed("boom");
        span.end();
        span.end();
    }
}
