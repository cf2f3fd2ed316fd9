use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Serialize;

use crate::{
    config::DatadogConfig,
    error::TelemetryError,
    models::{LogRecord, LogStatus, MetricSample, MetricType},
};

/// Destination of the direct-report path.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError>;
    async fn submit_logs(&self, records: &[LogRecord]) -> Result<(), TelemetryError>;
}

#[derive(Serialize)]
struct SeriesPayload<'a> {
    series: Vec<Series<'a>>,
}

#[derive(Serialize)]
struct Series<'a> {
    metric: &'a str,
    #[serde(rename = "type")]
    metric_type: MetricType,
    points: Vec<(i64, f64)>,
    tags: &'a [String],
}

#[derive(Serialize)]
struct LogItem<'a> {
    ddsource: &'a str,
    ddtags: String,
    hostname: &'a str,
    message: &'a str,
    service: &'a str,
    status: LogStatus,
}

/// Plain-HTTP client for the metrics series and log intake APIs.
#[derive(Clone)]
pub struct DatadogClient {
    client: Client,
    api_key: String,
    metrics_endpoint: String,
    logs_endpoint: String,
    service: String,
    hostname: String,
}

impl DatadogClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &DatadogConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client: Client::new(),
            api_key,
            metrics_endpoint: config.metrics_endpoint(),
            logs_endpoint: config.logs_endpoint(),
            service: config.service.clone(),
            hostname: config.hostname.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        accepted: &[StatusCode],
    ) -> Result<(), TelemetryError> {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .client
            .post(url)
            .header("DD-API-KEY", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if accepted.contains(&status) {
            Ok(())
        } else {
            Err(TelemetryError::UnexpectedStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl ReportSink for DatadogClient {
    async fn submit_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError> {
        let payload = SeriesPayload {
            series: samples
                .iter()
                .map(|sample| Series {
                    metric: &sample.name,
                    metric_type: sample.metric_type,
                    points: vec![(sample.timestamp, sample.value)],
                    tags: &sample.tags,
                })
                .collect(),
        };

        self.post(&self.metrics_endpoint, &payload, &[StatusCode::ACCEPTED])
            .await
    }

    async fn submit_logs(&self, records: &[LogRecord]) -> Result<(), TelemetryError> {
        let payload: Vec<LogItem> = records
            .iter()
            .map(|record| LogItem {
                ddsource: "rust",
                ddtags: record.tags.join(","),
                hostname: &self.hostname,
                message: &record.message,
                service: &self.service,
                status: record.status,
            })
            .collect();

        self.post(
            &self.logs_endpoint,
            &payload,
            &[StatusCode::OK, StatusCode::ACCEPTED],
        )
        .await
    }
}

/// Used when direct reporting is not configured.
pub struct DisabledSink;

#[async_trait]
impl ReportSink for DisabledSink {
    async fn submit_metrics(&self, samples: &[MetricSample]) -> Result<(), TelemetryError> {
        log::debug!("Direct reporting disabled; skipping {} metric(s)", samples.len());
        Ok(())
    }

    async fn submit_logs(&self, records: &[LogRecord]) -> Result<(), TelemetryError> {
        log::debug!("Direct reporting disabled; skipping {} log line(s)", records.len());
        Ok(())
    }
}
