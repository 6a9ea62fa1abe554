// src/bin/worker.rs

use std::io::BufRead;
use std::sync::Arc;

use clap::Parser;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};
use CaptionBlaster::config::{resolve_config, Args};
use CaptionBlaster::error::{CaptionError, Result};
use CaptionBlaster::events::WorkerEvent;
use CaptionBlaster::pipeline::readers::{BaseReader, ImageReader};
use CaptionBlaster::pipeline::writers::read_records;
use CaptionBlaster::service::AnthropicCaptionService;
use CaptionBlaster::utils::common::{init_tracing, setup_prometheus_metrics};
use CaptionBlaster::worker_logic::TaskQueueWorker;

/// Creates a `ProgressBar` (or a spinner when the total is unknown) with the given template.
fn create_progress_bar(total_items: u64, message: &str, template: &str) -> ProgressBar {
    let pb = if total_items == 0 {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::new(total_items)
    };
    pb.set_message(message.to_string());
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Reads single-letter commands from stdin: `p` pauses, `r` resumes, `c` cancels.
///
/// Runs on a plain thread so a blocked read never holds up runtime shutdown.
fn spawn_stdin_controls(worker: TaskQueueWorker) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim().to_ascii_lowercase().as_str() {
                "p" | "pause" => worker.pause(),
                "r" | "resume" => worker.resume(),
                "c" | "cancel" => {
                    worker.cancel();
                    break;
                }
                "" => {}
                other => eprintln!("Unknown command '{}'. Use p (pause), r (resume) or c (cancel).", other),
            }
            if !worker.is_running() {
                break;
            }
        }
    });
}

/// Cancels the run on Ctrl-C.
fn spawn_ctrl_c_handler(worker: TaskQueueWorker) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling after the current image.");
            worker.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the file appender flushes.
    let _log_guard = init_tracing(args.log_json, args.log_dir.as_deref());

    let config = resolve_config(&args)?;
    if args.validate_config {
        info!("Configuration is valid.");
        println!("Configuration is valid.");
        return Ok(());
    }

    if let Err(e) = setup_prometheus_metrics(args.metrics_port).await {
        error!("Failed to start Prometheus metrics endpoint: {}", e);
    }

    let items = ImageReader::new(args.inputs.clone(), args.recursive).read_items()?;
    if items.is_empty() {
        warn!("No images found in the given inputs.");
        return Err(CaptionError::NoWork);
    }
    info!("Found {} image(s) to caption.", items.len());

    let service = AnthropicCaptionService::new(config.service.clone())?;
    info!("Captioning with model {}", config.service.model);

    let worker = TaskQueueWorker::new(Arc::new(service), config.worker.clone());
    let mut events = worker
        .take_events()
        .ok_or_else(|| CaptionError::Unexpected("event stream already taken".to_string()))?;

    let total = items.len() as u64;
    worker.enqueue_all(items);
    worker.start()?;

    spawn_ctrl_c_handler(worker.clone());
    if !args.no_interactive {
        spawn_stdin_controls(worker.clone());
        eprintln!("Commands: p = pause, r = resume, c = cancel (then Enter)");
    }

    let template =
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";
    let pb = create_progress_bar(total, "Starting", template);
    let started = std::time::Instant::now();

    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Progress { processed, total } => {
                pb.set_length(total as u64);
                pb.set_position(processed as u64);
            }
            WorkerEvent::CurrentItem(item) => pb.set_message(item.file_name()),
            WorkerEvent::Status(message) => {
                debug!(status = %message);
                pb.set_message(message);
            }
            WorkerEvent::Result { item, result } => {
                debug!(
                    file = %item.file_name(),
                    korean = %result.payload.korean_caption,
                    "Caption stored"
                );
                pb.println(format!(
                    "{}: {}",
                    item.file_name(),
                    result.payload.english_caption
                ));
            }
            WorkerEvent::Error { item, kind, detail } => {
                pb.println(format!("[{}] {}: {}", kind, item.file_name(), detail));
            }
            WorkerEvent::Completed(summary) => {
                pb.finish_with_message(summary.to_string());
                break;
            }
        }
    }

    let summary = worker.wait().await?;

    let stored = match read_records(&summary.log_path) {
        Ok(records) => records.len(),
        Err(e) => {
            warn!("Could not read back result log: {}", e);
            0
        }
    };

    info!("--------------------");
    info!("Captioning Summary:");
    info!("  Images Queued: {}", summary.total);
    info!("  Images Processed: {}", summary.processed);
    info!("    - Succeeded: {}", summary.succeeded);
    info!("    - Failed: {}", summary.failed);
    if summary.persistence_failures > 0 {
        info!("    - Not written to log: {}", summary.persistence_failures);
    }
    info!("  Records in Log: {}", stored);
    info!("  Result Log: {}", summary.log_path.display());
    info!("  Elapsed: {}", HumanDuration(started.elapsed()));
    if summary.cancelled {
        info!("  Run was cancelled before the queue was drained.");
    }
    info!("--------------------");

    Ok(())
}
