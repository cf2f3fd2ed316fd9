pub mod config;
pub mod error;
pub mod gemini;
pub mod handler;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod retry;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use config::{Config, DatadogConfig, GeminiConfig};
pub use error::{GenerationError, Result, TelemetryError};
pub use gemini::{GeminiBackend, GeminiClient, GenerationBackend};
pub use handler::RequestHandler;
pub use models::*;
pub use pipeline::GenerationOrchestrator;
pub use retry::{RetryOutcome, RetryPolicy};
pub use telemetry::{TelemetryReporter, Tracer};
