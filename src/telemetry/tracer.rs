//! Process-scoped APM tracer handle.
//!
//! Spans are `tracing` spans recorded by a dispatcher owned by the handle,
//! whose OpenTelemetry layer feeds an SDK tracer provider. The provider
//! batches finished spans and exports them over OTLP to the trace agent.
//! The function host may freeze the process as soon as a response is
//! produced, so callers [`Tracer::flush`] before returning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};
use tracing::{field, Dispatch, Span};
use tracing_subscriber::layer::SubscriberExt;

use crate::{config::DatadogConfig, error::TelemetryError};

const INSTRUMENTATION_NAME: &str = "poseshift";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tags a span accepts. `tracing` only records fields declared when a span
/// opens, so anything else is ignored.
pub const SPAN_TAGS: &[&str] = &["model", "status", "latency_ms", "request_id", "error.message"];

struct TracerInner {
    service: String,
    provider: Option<TracerProvider>,
    dispatch: Dispatch,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

impl Tracer {
    /// Create the process's tracer, exporting to `{agent_url}/v1/traces`.
    /// Without an agent URL, or if the exporter cannot be built, spans are
    /// discarded. Must be called inside a tokio runtime.
    pub fn init(config: &DatadogConfig) -> Self {
        let Some(agent_url) = config.agent_url.as_deref() else {
            log::info!("Tracer initialized without an agent; spans are discarded");
            return Self::disabled(&config.service);
        };

        match otlp_exporter(agent_url) {
            Ok(exporter) => {
                let provider = TracerProvider::builder()
                    .with_batch_exporter(exporter, runtime::Tokio)
                    .with_resource(resource(config))
                    .build();
                log::info!("Tracer initialized, exporting to {}", agent_url);
                Self::with_provider(&config.service, provider)
            }
            Err(e) => {
                log::warn!("{}; spans are discarded", e);
                Self::disabled(&config.service)
            }
        }
    }

    /// Record spans into `provider`, whatever its processors and exporters.
    pub fn with_provider(service: &str, provider: TracerProvider) -> Self {
        let layer =
            tracing_opentelemetry::layer().with_tracer(provider.tracer(INSTRUMENTATION_NAME));
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(layer));
        Self::build(service, Some(provider), dispatch)
    }

    /// A tracer whose spans go nowhere.
    pub fn disabled(service: &str) -> Self {
        Self::build(service, None, Dispatch::none())
    }

    fn build(service: &str, provider: Option<TracerProvider>, dispatch: Dispatch) -> Self {
        Self {
            inner: Arc::new(TracerInner {
                service: service.to_string(),
                provider,
                dispatch,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.provider.is_some()
    }

    /// Open a root span, starting a new trace.
    pub fn start_span(&self, name: &str, resource: &str) -> SpanHandle {
        self.open(None, name, resource)
    }

    fn open(&self, parent: Option<&Span>, name: &str, resource: &str) -> SpanHandle {
        if self.inner.closed.load(Ordering::SeqCst) {
            log::warn!("Span '{}' opened after tracer shutdown; dropped", name);
            return SpanHandle::new(self.clone(), Span::none());
        }

        let parent = parent.and_then(Span::id);
        let span = tracing::dispatcher::with_default(&self.inner.dispatch, || {
            tracing::info_span!(
                parent: parent,
                "span",
                otel.name = name,
                resource.name = resource,
                model = field::Empty,
                status = field::Empty,
                latency_ms = field::Empty,
                request_id = field::Empty,
                error.message = field::Empty,
                otel.status_code = field::Empty,
                otel.status_message = field::Empty
            )
        });
        SpanHandle::new(self.clone(), span)
    }

    /// Export every finished span now. Never fails: export errors are logged.
    pub async fn flush(&self) {
        let Some(provider) = self.inner.provider.clone() else {
            return;
        };

        // force_flush blocks until the exporter answers.
        match tokio::task::spawn_blocking(move || provider.force_flush()).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        log::warn!("Failed to flush spans: {}", e);
                    }
                }
                log::debug!("Spans flushed for {}", self.inner.service);
            }
            Err(e) => log::warn!("Span flush task failed: {}", e),
        }
    }

    /// Flush what is left and stop accepting spans.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flush().await;

        if let Some(provider) = self.inner.provider.clone() {
            match tokio::task::spawn_blocking(move || provider.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Tracer shutdown failed: {}", e),
                Err(e) => log::warn!("Tracer shutdown task failed: {}", e),
            }
        }
        log::info!("Tracer shut down");
    }
}

fn otlp_exporter(agent_url: &str) -> Result<SpanExporter, TelemetryError> {
    SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{}/v1/traces", agent_url.trim_end_matches('/')))
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))
}

fn resource(config: &DatadogConfig) -> Resource {
    Resource::new([
        KeyValue::new("service.name", config.service.clone()),
        KeyValue::new("deployment.environment", config.env.clone()),
        KeyValue::new("host.name", config.hostname.clone()),
    ])
}

/// A live span. Tags stay mutable until [`SpanHandle::finish`]; a handle
/// dropped without finishing is finished as an error.
pub struct SpanHandle {
    tracer: Tracer,
    span: Span,
    finished: bool,
}

impl SpanHandle {
    fn new(tracer: Tracer, span: Span) -> Self {
        Self {
            tracer,
            span,
            finished: false,
        }
    }

    pub fn child(&self, name: &str, resource: &str) -> SpanHandle {
        self.tracer.open(Some(&self.span), name, resource)
    }

    /// The underlying span, for instrumenting futures that run inside it.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn set_tag(&self, key: &str, value: impl ToString) {
        if !SPAN_TAGS.contains(&key) {
            log::debug!("Span has no '{}' tag; ignored", key);
            return;
        }
        self.span.record(key, value.to_string().as_str());
    }

    /// Mark the span failed with `message`.
    pub fn set_error(&self, message: &str) {
        self.set_tag("status", "error");
        self.set_tag("error.message", message);
        self.span.record("otel.status_code", "error");
        self.span.record("otel.status_message", message);
    }

    pub fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        if !self.finished {
            self.set_error("span dropped before finish");
        }
    }
}
