use std::path::PathBuf;

use clap::Parser;

// Define command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image files or directories to caption, processed in the order given
    #[arg(required_unless_present = "validate_config")]
    pub inputs: Vec<PathBuf>,

    /// Scan directories recursively
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Path to a YAML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Result log (JSONL) path; defaults to captions_<timestamp>.jsonl in --output-dir
    #[arg(short = 'o', long)]
    pub log_file: Option<PathBuf>,

    /// Directory for the default result log
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// API key for the captioning service
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name sent to the captioning service
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the captioning service
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Attempts per image before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// First backoff delay in milliseconds; doubles on every transient failure
    #[arg(long)]
    pub base_delay_ms: Option<u64>,

    /// Add random jitter to backoff delays
    #[arg(long)]
    pub jitter: bool,

    /// Optional: Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Also write logs to daily rotating files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Do not read pause/resume/cancel commands from stdin
    #[arg(long)]
    pub no_interactive: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}
