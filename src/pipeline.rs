//! Pose-analysis → image-generation pipeline.
//!
//! The two steps run strictly in sequence, each inside its own child span.
//! Whatever happens, the parent span is finished and exactly one
//! success-or-error report is sent, agreeing with the returned outcome.

use std::future::Future;
use std::time::Instant;

use tracing::Instrument;

use crate::{
    error::Result,
    gemini::GeminiClient,
    logger,
    models::{GenerationOutcome, ImagePayload, PoseDescriptor},
    telemetry::{SpanHandle, TelemetryReporter, Tracer},
};

pub const PIPELINE_SPAN: &str = "pose_transfer.pipeline";
pub const ANALYZE_POSE_SPAN: &str = "pose_transfer.analyze_pose";
pub const GENERATE_IMAGE_SPAN: &str = "pose_transfer.generate_image";

#[derive(Clone)]
pub struct GenerationOrchestrator {
    client: GeminiClient,
    tracer: Tracer,
    reporter: TelemetryReporter,
}

impl GenerationOrchestrator {
    pub fn new(client: GeminiClient, tracer: Tracer, reporter: TelemetryReporter) -> Self {
        Self {
            client,
            tracer,
            reporter,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Move the pose of `pose_image` onto the person in `user_image`.
    /// Never fails; errors come back as a failed outcome.
    pub async fn run(
        &self,
        user_image: &ImagePayload,
        pose_image: &ImagePayload,
    ) -> GenerationOutcome {
        let started = Instant::now();
        let parent = self.tracer.start_span(PIPELINE_SPAN, "pose_transfer");
        if let Some(request_id) = logger::current_request_id() {
            parent.set_tag("request_id", request_id);
        }
        log::info!("Pose transfer started");

        let result = self.run_steps(&parent, user_image, pose_image).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        parent.set_tag("latency_ms", format!("{:.0}", latency_ms));

        let outcome = match result {
            Ok((image, pose)) => {
                parent.set_tag("status", "success");
                GenerationOutcome::succeeded(image, pose)
            }
            Err(message) => {
                parent.set_error(&message);
                GenerationOutcome::failed(message)
            }
        };
        parent.finish();

        match &outcome.error {
            None => {
                log::info!("Pose transfer succeeded in {:.0}ms", latency_ms);
                self.reporter.report_success(latency_ms).await;
            }
            Some(message) => {
                log::error!("Pose transfer failed in {:.0}ms: {}", latency_ms, message);
                self.reporter.report_error(message, latency_ms).await;
            }
        }

        outcome
    }

    async fn run_steps(
        &self,
        parent: &SpanHandle,
        user_image: &ImagePayload,
        pose_image: &ImagePayload,
    ) -> std::result::Result<(String, PoseDescriptor), String> {
        let pose = traced_step(
            parent,
            ANALYZE_POSE_SPAN,
            self.client.pose().model(),
            self.client.analyze_pose(pose_image),
        )
        .await
        .map_err(|e| format!("Pose analysis failed: {}", e))?;
        log::debug!("Pose analyzed: {}", pose.overall);

        let image = traced_step(
            parent,
            GENERATE_IMAGE_SPAN,
            self.client.image().model(),
            self.client.generate_image(user_image, pose_image, &pose),
        )
        .await
        .map_err(|e| format!("Image generation failed: {}", e))?;

        Ok((image, pose))
    }
}

async fn traced_step<T>(
    parent: &SpanHandle,
    name: &str,
    model: &str,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    let span = parent.child(name, name);
    span.set_tag("model", model);

    let result = step.instrument(span.span().clone()).await;
    match &result {
        Ok(_) => span.set_tag("status", "success"),
        Err(e) => span.set_error(&e.to_string()),
    }
    span.finish();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatadogConfig, GeminiConfig};
    use crate::models::LogStatus;
    use crate::retry::RetryPolicy;
    use crate::telemetry::{reporter::*, reporter_from_config};
    use crate::test_support::{
        attribute, find_span, pose_json, recording_tracer, sample_image, sample_pose,
        unreachable_url, FakeBackend, RecordingSink,
    };
    use httpmock::prelude::*;
    use opentelemetry::trace::Status;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use std::sync::Arc;

    const ANALYSIS: &str = "analysis-model";
    const IMAGE: &str = "image-model";

    fn orchestrator(
        backend: Arc<FakeBackend>,
        reporter: TelemetryReporter,
    ) -> (GenerationOrchestrator, InMemorySpanExporter) {
        let config = GeminiConfig::new().with_models(ANALYSIS, IMAGE);
        let client = GeminiClient::with_backend(backend, &config, RetryPolicy::default());
        let (tracer, exporter) = recording_tracer();
        (GenerationOrchestrator::new(client, tracer, reporter), exporter)
    }

    fn recording(sink: &Arc<RecordingSink>) -> TelemetryReporter {
        TelemetryReporter::new(sink.clone(), vec!["service:poseshift".to_string()])
    }

    #[tokio::test]
    async fn test_successful_transfer() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_text(ANALYSIS, &pose_json())
                .with_images(IMAGE, &["R0VORVJBVEVE"]),
        );
        let sink = Arc::new(RecordingSink::new());
        let (pipeline, exporter) = orchestrator(backend.clone(), recording(&sink));

        let outcome = pipeline.run(&sample_image(), &sample_image()).await;

        assert_eq!(
            outcome,
            GenerationOutcome::succeeded("R0VORVJBVEVE".to_string(), sample_pose())
        );
        assert_eq!(outcome.pose_description, Some(sample_pose().summary()));
        assert_eq!(backend.calls_for(ANALYSIS), 1);
        assert_eq!(backend.calls_for(IMAGE), 1);

        let metrics = sink.metrics();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().any(|m| m.name == GENERATION_COUNT_METRIC));
        assert!(metrics.iter().any(|m| m.name == GENERATION_LATENCY_METRIC));
        assert!(metrics.iter().all(|m| m.tags.contains(&"status:success".to_string())));
        assert_eq!(sink.logs().len(), 1);
        assert_eq!(sink.logs()[0].status, LogStatus::Info);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 3);
        let parent = find_span(&spans, PIPELINE_SPAN).unwrap();
        assert_eq!(attribute(parent, "status").as_deref(), Some("success"));
        assert!(attribute(parent, "latency_ms").is_some());
        assert!(!matches!(parent.status, Status::Error { .. }));
        for (name, model) in [(ANALYZE_POSE_SPAN, ANALYSIS), (GENERATE_IMAGE_SPAN, IMAGE)] {
            let child = find_span(&spans, name).unwrap();
            assert_eq!(child.parent_span_id, parent.span_context.span_id());
            assert_eq!(child.span_context.trace_id(), parent.span_context.trace_id());
            assert_eq!(attribute(child, "model").as_deref(), Some(model));
            assert_eq!(attribute(child, "status").as_deref(), Some("success"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_analysis_skips_image_generation() {
        let backend = Arc::new(FakeBackend::new());
        let sink = Arc::new(RecordingSink::new());
        let (pipeline, exporter) = orchestrator(backend.clone(), recording(&sink));

        let outcome = pipeline.run(&sample_image(), &sample_image()).await;

        assert!(!outcome.success);
        assert!(outcome.generated_image.is_none());
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .starts_with("Pose analysis failed"));
        assert_eq!(backend.calls_for(ANALYSIS), 3);
        assert_eq!(backend.calls_for(IMAGE), 0);

        let metrics = sink.metrics();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().any(|m| m.name == GENERATION_ERRORS_METRIC));
        assert!(metrics.iter().all(|m| m.tags.contains(&"status:error".to_string())));
        assert_eq!(sink.logs().len(), 1);
        assert_eq!(sink.logs()[0].status, LogStatus::Error);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert!(find_span(&spans, GENERATE_IMAGE_SPAN).is_none());
        let parent = find_span(&spans, PIPELINE_SPAN).unwrap();
        assert_eq!(attribute(parent, "status").as_deref(), Some("error"));
        assert!(matches!(parent.status, Status::Error { .. }));
        assert_eq!(attribute(parent, "error.message"), outcome.error.clone());
        let analyze = find_span(&spans, ANALYZE_POSE_SPAN).unwrap();
        assert_eq!(attribute(analyze, "status").as_deref(), Some("error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_failure_after_transient_analysis_error() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_error(ANALYSIS, "connection reset")
                .with_text(ANALYSIS, &pose_json())
                .with_text(IMAGE, "no picture for you"),
        );
        let sink = Arc::new(RecordingSink::new());
        let (pipeline, exporter) = orchestrator(backend.clone(), recording(&sink));

        let outcome = pipeline.run(&sample_image(), &sample_image()).await;

        assert_eq!(
            outcome.error.as_deref(),
            Some("Image generation failed: Generation backend returned no image")
        );
        assert_eq!(backend.calls_for(ANALYSIS), 2);
        assert_eq!(backend.calls_for(IMAGE), 3);

        let spans = exporter.get_finished_spans().unwrap();
        let status_of = |name| attribute(find_span(&spans, name).unwrap(), "status");
        assert_eq!(status_of(ANALYZE_POSE_SPAN).as_deref(), Some("success"));
        assert_eq!(status_of(GENERATE_IMAGE_SPAN).as_deref(), Some("error"));
        assert_eq!(status_of(PIPELINE_SPAN).as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn test_rejected_telemetry_does_not_change_outcome() {
        let server = MockServer::start_async().await;
        let metrics = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/series");
                then.status(500);
            })
            .await;
        let logs = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/logs");
                then.status(400);
            })
            .await;

        let reporter = reporter_from_config(
            &DatadogConfig::new()
                .with_api_key("dd-key")
                .with_intake_urls(server.base_url(), server.base_url()),
        );
        let backend = Arc::new(
            FakeBackend::new()
                .with_text(ANALYSIS, &pose_json())
                .with_images(IMAGE, &["SU1BR0U="]),
        );
        let (pipeline, _) = orchestrator(backend, reporter);

        let outcome = pipeline.run(&sample_image(), &sample_image()).await;

        assert_eq!(
            outcome,
            GenerationOutcome::succeeded("SU1BR0U=".to_string(), sample_pose())
        );
        metrics.assert_hits_async(2).await;
        logs.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_unreachable_intake_does_not_change_outcome() {
        let url = unreachable_url();
        let reporter = reporter_from_config(
            &DatadogConfig::new()
                .with_api_key("dd-key")
                .with_intake_urls(url.clone(), url),
        );
        let backend = Arc::new(
            FakeBackend::new()
                .with_text(ANALYSIS, &pose_json())
                .with_images(IMAGE, &["SU1BR0U="]),
        );
        let (pipeline, _) = orchestrator(backend, reporter);

        let outcome = pipeline.run(&sample_image(), &sample_image()).await;

        assert_eq!(
            outcome,
            GenerationOutcome::succeeded("SU1BR0U=".to_string(), sample_pose())
        );
    }

    #[tokio::test]
    async fn test_parent_span_carries_request_id() {
        let backend = Arc::new(
            FakeBackend::new()
                .with_text(ANALYSIS, &pose_json())
                .with_images(IMAGE, &["SU1BR0U="]),
        );
        let sink = Arc::new(RecordingSink::new());
        let (pipeline, exporter) = orchestrator(backend, recording(&sink));

        logger::with_request_id("req-7", pipeline.run(&sample_image(), &sample_image())).await;

        let spans = exporter.get_finished_spans().unwrap();
        let parent = find_span(&spans, PIPELINE_SPAN).unwrap();
        assert_eq!(attribute(parent, "request_id").as_deref(), Some("req-7"));
    }
}
