// src/config/mod.rs

pub mod settings;
pub mod worker;

pub use settings::{
    load_caption_config, CaptionConfig, RetryConfig, ServiceConfig, WorkerConfig, DEFAULT_PROMPT,
};
pub use worker::Args;

use crate::error::Result;
use tracing::debug;

/// Builds the effective configuration: defaults, then the YAML file (if any),
/// then command-line overrides.
pub fn resolve_config(args: &Args) -> Result<CaptionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            debug!(path = %path.display(), "Loading configuration file");
            load_caption_config(path)?
        }
        None => CaptionConfig::default(),
    };

    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut CaptionConfig, args: &Args) {
    if let Some(path) = &args.log_file {
        config.worker.log_file = Some(path.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.worker.output_dir = dir.clone();
    }
    if let Some(max_attempts) = args.max_attempts {
        config.worker.retry.max_attempts = max_attempts;
    }
    if let Some(base_delay_ms) = args.base_delay_ms {
        config.worker.retry.base_delay_ms = base_delay_ms;
    }
    if args.jitter {
        config.worker.retry.jitter = true;
    }
    if let Some(key) = &args.api_key {
        config.service.api_key = key.clone();
    }
    if let Some(model) = &args.model {
        config.service.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.service.endpoint = endpoint.clone();
    }
}
