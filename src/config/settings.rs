use crate::error::{CaptionError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROMPT: &str = r#"Analyze the image and answer in exactly this JSON format:
{
  "text": {
    "english_caption": "A detailed description of the image in English (3 sentences). If people are present, include gender, approximate age, appearance, clothing and facial expression.",
    "korean_caption": "The same detailed description written in Korean (3 sentences)."
  }
}
Notes:
1. If people are present, always state their gender.
2. Include an age range where possible (e.g. early 20s, mid 30s).
3. Describe appearance, clothing and expression in detail.
4. If there are no people, describe the main elements and mood of the image.
5. The reply must follow the JSON format above."#;

/// Overall configuration, optionally read from YAML and overridden by CLI flags.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionConfig {
    pub worker: WorkerConfig,
    pub service: ServiceConfig,
}

/// Settings for the queue worker. Constructed once and handed to the worker.
#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Directory for the default result log name.
    pub output_dir: PathBuf,
    /// Explicit result log path; `captions_<timestamp>.jsonl` in `output_dir` otherwise.
    pub log_file: Option<PathBuf>,
    /// Upper bound on how long a paused worker sleeps between flag checks.
    pub pause_poll_interval_ms: u64,
    /// Captions longer than this many sentences are truncated.
    pub max_sentences: usize,
    /// Images above this size produce a warning status.
    pub large_file_warning_bytes: u64,
    pub prompt: String,
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            output_dir: PathBuf::from("."),
            log_file: None,
            pause_poll_interval_ms: 500,
            max_sentences: 3,
            large_file_warning_bytes: 20 * 1024 * 1024,
            prompt: DEFAULT_PROMPT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Add up to 25% random jitter to each backoff wait.
    pub jitter: bool,
    /// Retry replies missing a caption (no wait, counts against `max_attempts`).
    pub retry_incomplete_payloads: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 2000,
            jitter: false,
            retry_incomplete_payloads: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_version: String,
    pub timeout_secs: u64,
    // Never read from YAML; comes from the CLI or the environment.
    #[serde(skip)]
    pub api_key: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            max_tokens: 4096,
            api_version: "2023-06-01".to_string(),
            timeout_secs: 120,
            api_key: String::new(),
        }
    }
}

impl CaptionConfig {
    pub fn validate(&self) -> Result<()> {
        self.worker.validate()?;
        self.service.validate()
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pause_poll_interval_ms == 0 {
            return Err(CaptionError::ConfigValidationError(
                "worker.pause_poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_sentences == 0 {
            return Err(CaptionError::ConfigValidationError(
                "worker.max_sentences must be at least 1".to_string(),
            ));
        }
        if self.prompt.trim().is_empty() {
            return Err(CaptionError::ConfigValidationError(
                "worker.prompt must not be empty".to_string(),
            ));
        }
        self.retry.validate()
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CaptionError::ConfigValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_attempts > 16 {
            return Err(CaptionError::ConfigValidationError(format!(
                "retry.max_attempts must be at most 16, got {}",
                self.max_attempts
            )));
        }
        Ok(())
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(CaptionError::ConfigValidationError(format!(
                "service.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.model.trim().is_empty() {
            return Err(CaptionError::ConfigValidationError(
                "service.model must not be empty".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(CaptionError::ConfigValidationError(
                "service.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(CaptionError::ConfigValidationError(
                "service.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads and parses the YAML configuration file.
pub fn load_caption_config<P: AsRef<Path>>(config_path: P) -> Result<CaptionConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        CaptionError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&config_content).map_err(|e| {
        CaptionError::ConfigError(format!(
            "Failed to parse config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })
}
