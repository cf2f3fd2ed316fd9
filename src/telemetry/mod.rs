//! Telemetry for the pipeline, over two independent channels:
//!
//! - **Spans** through the process-scoped [`Tracer`], `tracing` spans exported
//!   over OTLP and flushed to the trace agent before the function returns.
//! - **Direct reports** through [`TelemetryReporter`], posted straight to the
//!   metrics and log intake so they survive even if the tracer cannot flush.
//!
//! Neither channel ever fails the request.

pub mod datadog;
pub mod reporter;
pub mod tracer;

use std::sync::Arc;

use crate::config::DatadogConfig;

pub use datadog::{DatadogClient, DisabledSink, ReportSink};
pub use reporter::TelemetryReporter;
pub use tracer::{SpanHandle, Tracer};

/// Reporter wired to the HTTP intake, or to a no-op sink without an API key.
pub fn reporter_from_config(config: &DatadogConfig) -> TelemetryReporter {
    let sink: Arc<dyn ReportSink> = match DatadogClient::from_config(config) {
        Some(client) => Arc::new(client),
        None => {
            log::warn!("DD_API_KEY not set; direct metric and log reporting disabled");
            Arc::new(DisabledSink)
        }
    };
    TelemetryReporter::new(sink, config.base_tags())
}
