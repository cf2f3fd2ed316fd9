use std::env;
use std::time::Duration;

use crate::error::{GenerationError, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub analysis_model: String,
    pub image_model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty());
        let base_url = env::var("GEMINI_BASE_URL").unwrap_or(defaults.base_url);
        let analysis_model = env::var("GEMINI_ANALYSIS_MODEL").unwrap_or(defaults.analysis_model);
        let image_model = env::var("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model);
        let request_timeout = env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        GeminiConfig {
            api_key,
            base_url,
            analysis_model,
            image_model,
            request_timeout,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(
        mut self,
        analysis_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        self.analysis_model = analysis_model.into();
        self.image_model = image_model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => Ok(()),
            _ => Err(GenerationError::ConfigError(
                "GEMINI_API_KEY is required".into(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatadogConfig {
    pub api_key: Option<String>,
    pub site: String,
    pub service: String,
    pub env: String,
    pub hostname: String,
    /// Base URL of the trace agent's OTLP receiver; spans are discarded when unset.
    pub agent_url: Option<String>,
    /// Overrides the `https://api.{site}` metrics endpoint, mostly for tests.
    pub metrics_url: Option<String>,
    /// Overrides the `https://http-intake.logs.{site}` endpoint.
    pub logs_url: Option<String>,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        DatadogConfig {
            api_key: None,
            site: "datadoghq.com".to_string(),
            service: "poseshift".to_string(),
            env: "dev".to_string(),
            hostname: "poseshift-function".to_string(),
            agent_url: None,
            metrics_url: None,
            logs_url: None,
        }
    }
}

impl DatadogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        DatadogConfig {
            api_key: env::var("DD_API_KEY").ok().filter(|key| !key.is_empty()),
            site: env::var("DD_SITE").unwrap_or(defaults.site),
            service: env::var("DD_SERVICE").unwrap_or(defaults.service),
            env: env::var("DD_ENV").unwrap_or(defaults.env),
            hostname: env::var("DD_HOSTNAME").unwrap_or(defaults.hostname),
            agent_url: env::var("DD_TRACE_AGENT_URL").ok(),
            metrics_url: None,
            logs_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>, env: impl Into<String>) -> Self {
        self.service = service.into();
        self.env = env.into();
        self
    }

    pub fn with_agent_url(mut self, agent_url: impl Into<String>) -> Self {
        self.agent_url = Some(agent_url.into());
        self
    }

    pub fn with_intake_urls(
        mut self,
        metrics_url: impl Into<String>,
        logs_url: impl Into<String>,
    ) -> Self {
        self.metrics_url = Some(metrics_url.into());
        self.logs_url = Some(logs_url.into());
        self
    }

    pub fn metrics_endpoint(&self) -> String {
        let base = self
            .metrics_url
            .clone()
            .unwrap_or_else(|| format!("https://api.{}", self.site));
        format!("{}/api/v1/series", base.trim_end_matches('/'))
    }

    pub fn logs_endpoint(&self) -> String {
        let base = self
            .logs_url
            .clone()
            .unwrap_or_else(|| format!("https://http-intake.logs.{}", self.site));
        format!("{}/api/v2/logs", base.trim_end_matches('/'))
    }

    /// Tags attached to every metric and log line.
    pub fn base_tags(&self) -> Vec<String> {
        vec![
            format!("service:{}", self.service),
            format!("env:{}", self.env),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub port: Option<u16>,
    pub gemini: GeminiConfig,
    pub datadog: DatadogConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let port = env::var("PORT").ok().and_then(|port| port.parse().ok());

        Config {
            port,
            gemini: GeminiConfig::from_env(),
            datadog: DatadogConfig::from_env(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_datadog(mut self, config: DatadogConfig) -> Self {
        self.datadog = config;
        self
    }
}
