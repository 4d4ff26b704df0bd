//! Agent configuration, loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration for the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Region the cloud client starts bound to.
    #[serde(default = "default_region")]
    pub region: String,
    /// Regions the operator may switch to.
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    /// Per-call timeout for cloud capability calls.
    #[serde(default = "default_cloud_timeout_secs")]
    pub cloud_timeout_secs: u64,
    /// Guideline corpus consulted by the remediation loop.
    #[serde(default = "default_guidelines_path")]
    pub guidelines_path: String,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_region() -> String {
    "ap-northeast-2".into()
}
fn default_regions() -> Vec<String> {
    [
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-central-1",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-south-1",
        "ca-central-1",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_cloud_timeout_secs() -> u64 {
    15
}
fn default_guidelines_path() -> String {
    "config/guidelines.toml".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            regions: default_regions(),
            cloud_timeout_secs: default_cloud_timeout_secs(),
            guidelines_path: default_guidelines_path(),
            model: ModelConfig::default(),
            monitor: MonitorConfig::default(),
            notify: NotifyConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file path. A missing file yields defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud_timeout_secs)
    }

    pub fn is_known_region(&self, region: &str) -> bool {
        self.regions.iter().any(|r| r == region)
    }
}

/// Which generative-model backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    Ollama,
    Bedrock,
}

/// Generative-model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub backend: ModelBackend,
    /// Ollama HTTP API base URL.
    #[serde(default = "default_model_host")]
    pub host: String,
    /// Ollama model tag.
    #[serde(default = "default_model_name")]
    pub model: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_bedrock_model_id")]
    pub bedrock_model_id: String,
}

fn default_model_host() -> String {
    "http://localhost:11434".into()
}
fn default_model_name() -> String {
    "llama3.2:3b".into()
}
fn default_model_timeout_secs() -> u64 {
    30
}
fn default_bedrock_model_id() -> String {
    "us.amazon.nova-lite-v1:0".into()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::default(),
            host: default_model_host(),
            model: default_model_name(),
            timeout_secs: default_model_timeout_secs(),
            bedrock_model_id: default_bedrock_model_id(),
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Remediation loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Sleep between scan ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Running instances above this CPU percentage raise a Warning.
    #[serde(default = "default_utilization_threshold")]
    pub utilization_threshold: f64,
    #[serde(default = "default_guideline_top_n")]
    pub guideline_top_n: usize,
    /// Log lines fetched per incident.
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    /// Trailing characters of the log kept in the decision prompt.
    #[serde(default = "default_log_excerpt_chars")]
    pub log_excerpt_chars: usize,
    /// Upper bound on one whole tick.
    #[serde(default = "default_tick_timeout_secs")]
    pub tick_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}
fn default_utilization_threshold() -> f64 {
    80.0
}
fn default_guideline_top_n() -> usize {
    3
}
fn default_log_lines() -> usize {
    50
}
fn default_log_excerpt_chars() -> usize {
    500
}
fn default_tick_timeout_secs() -> u64 {
    300
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            utilization_threshold: default_utilization_threshold(),
            guideline_top_n: default_guideline_top_n(),
            log_lines: default_log_lines(),
            log_excerpt_chars: default_log_excerpt_chars(),
            tick_timeout_secs: default_tick_timeout_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout_secs)
    }
}

/// Notification settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl NotifyConfig {
    /// `SLACK_WEBHOOK_URL` overrides the file value.
    pub fn resolved_webhook(&self) -> Option<String> {
        std::env::var("SLACK_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.webhook_url.clone())
    }
}

/// Optional HTTP operator surface.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_host() -> String {
    "127.0.0.1".into()
}
fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}
