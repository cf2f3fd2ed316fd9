//! Fakes and fixtures shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use opentelemetry::Value;
use opentelemetry_sdk::{
    export::trace::SpanData, testing::trace::InMemorySpanExporter, trace::TracerProvider,
};

use crate::{
    error::{GenerationError, Result, TelemetryError},
    gemini::GenerationBackend,
    models::{
        Candidate, Content, GenerateContentRequest, GenerateContentResponse, ImagePayload,
        InlineData, LogRecord, MetricSample, Part, PoseDescriptor,
    },
    telemetry::{ReportSink, Tracer},
};

pub fn sample_image() -> ImagePayload {
    ImagePayload::new("aGVsbG8=", "image/png")
}

pub fn sample_pose() -> PoseDescriptor {
    PoseDescriptor {
        head: "tilted left".into(),
        torso: "upright".into(),
        left_arm: "raised".into(),
        right_arm: "on hip".into(),
        left_leg: "straight".into(),
        right_leg: "bent".into(),
        overall: "confident stance".into(),
    }
}

pub fn pose_json() -> String {
    serde_json::to_string(&sample_pose()).unwrap()
}

/// Tracer exporting each span synchronously into memory as it finishes.
pub fn recording_tracer() -> (Tracer, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (Tracer::with_provider("poseshift", provider), exporter)
}

pub fn find_span<'a>(spans: &'a [SpanData], name: &str) -> Option<&'a SpanData> {
    spans.iter().find(|span| span.name == name)
}

/// Last value recorded under `key`.
pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .rev()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| match &kv.value {
            Value::String(value) => value.as_str().to_string(),
            other => other.to_string(),
        })
}

/// An address nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

fn response_with(parts: Vec<Part>) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content {
                role: Some("model".to_string()),
                parts,
            }),
        }],
    }
}

enum Scripted {
    Response(GenerateContentResponse),
    Error(String),
}

/// Backend answering from a per-model script. An exhausted script answers
/// with an empty response.
#[derive(Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, model: &str, item: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(item);
        self
    }

    pub fn with_text(self, model: &str, text: &str) -> Self {
        self.push(model, Scripted::Response(response_with(vec![Part::text(text)])))
    }

    pub fn with_images(self, model: &str, images: &[&str]) -> Self {
        let parts = images
            .iter()
            .map(|data| Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: "image/png".to_string(),
                    data: data.to_string(),
                }),
            })
            .collect();
        self.push(model, Scripted::Response(response_with(parts)))
    }

    pub fn with_error(self, model: &str, message: &str) -> Self {
        self.push(model, Scripted::Error(message.to_string()))
    }

    pub fn calls_for(&self, model: &str) -> u32 {
        self.calls.lock().unwrap().get(model).copied().unwrap_or(0)
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn generate_content(
        &self,
        model: &str,
        _request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        *self.calls.lock().unwrap().entry(model.to_string()).or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Response(response)) => Ok(response),
            Some(Scripted::Error(message)) => Err(GenerationError::RequestError(message)),
            None => Ok(GenerateContentResponse::default()),
        }
    }
}

/// Sink that keeps what it was sent, optionally rejecting every metric.
#[derive(Default)]
pub struct RecordingSink {
    metrics: Mutex<Vec<MetricSample>>,
    logs: Mutex<Vec<LogRecord>>,
    fail_metrics: bool,
    metric_attempts: AtomicU32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_metrics(mut self) -> Self {
        self.fail_metrics = true;
        self
    }

    pub fn metrics(&self) -> Vec<MetricSample> {
        self.metrics.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().unwrap().clone()
    }

    pub fn metric_attempts(&self) -> u32 {
        self.metric_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn submit_metrics(
        &self,
        samples: &[MetricSample],
    ) -> std::result::Result<(), TelemetryError> {
        self.metric_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_metrics {
            return Err(TelemetryError::UnexpectedStatus {
                status: 500,
                body: "intake unavailable".to_string(),
            });
        }
        self.metrics.lock().unwrap().extend_from_slice(samples);
        Ok(())
    }

    async fn submit_logs(&self, records: &[LogRecord]) -> std::result::Result<(), TelemetryError> {
        self.logs.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}
