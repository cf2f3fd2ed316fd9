use std::sync::Arc;

use crate::models::{LogRecord, LogStatus, MetricSample};

use super::ReportSink;

pub const GENERATION_COUNT_METRIC: &str = "poseshift.generation.count";
pub const GENERATION_LATENCY_METRIC: &str = "poseshift.generation.latency";
pub const GENERATION_ERRORS_METRIC: &str = "poseshift.generation.errors";

/// Direct-report half of the telemetry: metrics and log lines posted over
/// plain HTTP, awaited before the pipeline returns. Each delivery is
/// independent and a failed one is only logged.
#[derive(Clone)]
pub struct TelemetryReporter {
    sink: Arc<dyn ReportSink>,
    base_tags: Vec<String>,
}

impl TelemetryReporter {
    pub fn new(sink: Arc<dyn ReportSink>, base_tags: Vec<String>) -> Self {
        Self { sink, base_tags }
    }

    fn tags(&self, status: &str) -> Vec<String> {
        let mut tags = self.base_tags.clone();
        tags.push(format!("status:{}", status));
        tags
    }

    pub async fn report_success(&self, latency_ms: f64) {
        let tags = self.tags("success");

        let count = MetricSample::count(GENERATION_COUNT_METRIC, 1.0).with_tags(tags.clone());
        let latency =
            MetricSample::gauge(GENERATION_LATENCY_METRIC, latency_ms).with_tags(tags.clone());
        let line = LogRecord::new(
            LogStatus::Info,
            format!("Pose transfer succeeded in {:.0}ms", latency_ms),
        )
        .with_tags(tags);

        futures::join!(
            self.deliver_metric(count),
            self.deliver_metric(latency),
            self.deliver_log(line),
        );
    }

    pub async fn report_error(&self, message: &str, latency_ms: f64) {
        let tags = self.tags("error");

        let count = MetricSample::count(GENERATION_COUNT_METRIC, 1.0).with_tags(tags.clone());
        let errors = MetricSample::count(GENERATION_ERRORS_METRIC, 1.0).with_tags(tags.clone());
        let line = LogRecord::new(
            LogStatus::Error,
            format!("Pose transfer failed after {:.0}ms: {}", latency_ms, message),
        )
        .with_tags(tags);

        futures::join!(
            self.deliver_metric(count),
            self.deliver_metric(errors),
            self.deliver_log(line),
        );
    }

    async fn deliver_metric(&self, sample: MetricSample) {
        if let Err(e) = self.sink.submit_metrics(std::slice::from_ref(&sample)).await {
            log::warn!("Dropping metric {}: {}", sample.name, e);
        }
    }

    async fn deliver_log(&self, record: LogRecord) {
        if let Err(e) = self.sink.submit_logs(std::slice::from_ref(&record)).await {
            log::warn!("Dropping log line: {}", e);
        }
    }
}
