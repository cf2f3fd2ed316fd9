use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Response error: {0}")]
    ResponseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Generation backend returned no usable text")]
    EmptyResponse,
    #[error("Generation backend returned malformed output: {0}")]
    MalformedResponse(String),
    #[error("Generation backend returned no image")]
    NoImageReturned,
}

/// Delivery failures on the telemetry paths. These are logged and dropped,
/// never surfaced to the pipeline caller.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry transport error: {0}")]
    Transport(String),
    #[error("Telemetry intake answered {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Telemetry payload could not be encoded: {0}")]
    Serialization(String),
    #[error("Trace exporter unavailable: {0}")]
    Exporter(String),
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        TelemetryError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for TelemetryError {
    fn from(err: serde_json::Error) -> Self {
        TelemetryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
