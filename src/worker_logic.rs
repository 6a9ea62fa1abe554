// src/worker_logic.rs

//! The caption queue worker.
//!
//! A single background task drains a FIFO of image paths. Each image is sent to
//! a [`CaptionService`] with bounded retry, the normalized captions are appended
//! to the result log, and everything that happens is reported as a
//! [`WorkerEvent`] on a channel the caller drains on its own context.
//!
//! Pause and cancel are cooperative: the worker only looks at them between
//! items, so a call already in flight always runs to completion.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::WorkerConfig;
use crate::data_model::{CaptionText, ImagePayload, ProcessingResult, WorkItem};
use crate::error::{CaptionError, Result};
use crate::events::{ErrorKind, EventEmitter, EventReceiver, RunSummary, WorkerEvent};
use crate::pipeline::readers::load_image;
use crate::pipeline::writers::{default_log_path, ensure_jsonl_extension, BaseWriter, JsonlWriter};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::service::{CaptionService, ServiceError};
use crate::utils::prometheus_metrics::*;
use crate::utils::text::normalize_captions;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<WorkItem>,
    /// Items known to the current run: pending at start plus later enqueues.
    total: usize,
}

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<QueueState>,
    running: AtomicBool,
    paused: AtomicBool,
    cancelled: AtomicBool,
    wake: Notify,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, QueueState> {
        // The queue holds plain data; a panic while locked cannot leave it inconsistent.
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// Handle to the caption queue worker. Clones share the same queue and run.
#[derive(Clone)]
pub struct TaskQueueWorker {
    shared: Arc<Shared>,
    service: Arc<dyn CaptionService>,
    config: Arc<WorkerConfig>,
    events: EventEmitter,
    event_rx: Arc<Mutex<Option<EventReceiver>>>,
    run_handle: Arc<Mutex<Option<JoinHandle<RunSummary>>>>,
}

impl TaskQueueWorker {
    pub fn new(service: Arc<dyn CaptionService>, config: WorkerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        TaskQueueWorker {
            shared: Arc::new(Shared::default()),
            service,
            config: Arc::new(config),
            events: EventEmitter::new(tx),
            event_rx: Arc::new(Mutex::new(Some(rx))),
            run_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Hands out the event stream. Only the first call gets it.
    pub fn take_events(&self) -> Option<EventReceiver> {
        self.event_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    pub fn enqueue(&self, item: WorkItem) {
        let mut queue = self.shared.queue();
        queue.pending.push_back(item);
        queue.total += 1;
        QUEUE_PENDING.set(queue.pending.len() as f64);
    }

    pub fn enqueue_all(&self, items: impl IntoIterator<Item = WorkItem>) {
        let mut queue = self.shared.queue();
        for item in items {
            queue.pending.push_back(item);
            queue.total += 1;
        }
        QUEUE_PENDING.set(queue.pending.len() as f64);
    }

    pub fn pending_len(&self) -> usize {
        self.shared.queue().pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// The log path a run started now would write to.
    pub fn resolve_log_path(&self) -> PathBuf {
        match &self.config.log_file {
            Some(path) => ensure_jsonl_extension(path.clone()),
            None => default_log_path(&self.config.output_dir, Local::now()),
        }
    }

    /// Starts consuming the queue on a background task and returns at once.
    ///
    /// Fails with `AlreadyRunning` if a run is in progress, `NoWork` if nothing
    /// is queued, or `Persistence` if the result log cannot be opened.
    pub fn start(&self) -> Result<()> {
        self.begin_run()?;
        let writer = match JsonlWriter::open(self.resolve_log_path()) {
            Ok(writer) => writer,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.spawn_run(Box::new(writer))
    }

    /// Like [`start`](Self::start) but appends to a caller-supplied sink.
    pub fn start_with_writer(&self, writer: Box<dyn BaseWriter + Send>) -> Result<()> {
        self.begin_run()?;
        self.spawn_run(writer)
    }

    fn begin_run(&self) -> Result<()> {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("start() called while a run is in progress");
            return Err(CaptionError::AlreadyRunning);
        }

        let mut queue = self.shared.queue();
        if queue.pending.is_empty() {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(CaptionError::NoWork);
        }
        queue.total = queue.pending.len();
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.cancelled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn spawn_run(&self, writer: Box<dyn BaseWriter + Send>) -> Result<()> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(CaptionError::Unexpected(
                    "start() must be called from within a tokio runtime".to_string(),
                ));
            }
        };

        let run = QueueRun {
            shared: Arc::clone(&self.shared),
            service: Arc::clone(&self.service),
            policy: RetryPolicy::from_config(&self.config.retry),
            config: Arc::clone(&self.config),
            events: self.events.clone(),
            log_path: writer.location().to_path_buf(),
            writer: Some(writer),
        };
        let handle = runtime.spawn(run.run());
        *self
            .run_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        Ok(())
    }

    /// Waits for the current run to finish and returns its summary.
    pub async fn wait(&self) -> Result<RunSummary> {
        let handle = self
            .run_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| CaptionError::Unexpected("worker has not been started".to_string()))?;
        handle
            .await
            .map_err(|e| CaptionError::Unexpected(format!("worker task failed: {}", e)))
    }

    /// Requests a pause; the item in flight finishes first.
    pub fn pause(&self) {
        if !self.is_running() {
            return;
        }
        if !self.shared.paused.swap(true, Ordering::SeqCst) {
            info!("Pause requested");
            self.events
                .status("Pause requested. The current item will finish first.");
        }
    }

    pub fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::SeqCst) {
            info!("Resume requested");
            self.shared.wake.notify_waiters();
        }
    }

    /// Requests termination and discards everything still pending.
    pub fn cancel(&self) {
        if !self.is_running() || self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let discarded = {
            let mut queue = self.shared.queue();
            let discarded = queue.pending.len();
            queue.pending.clear();
            QUEUE_PENDING.set(0.0);
            discarded
        };
        ITEMS_DISCARDED_TOTAL.inc_by(discarded as f64);
        info!(discarded, "Cancellation requested");
        self.events.status(format!(
            "Cancellation requested. {} pending item(s) discarded.",
            discarded
        ));
        self.shared.wake.notify_waiters();
    }
}

enum ItemOutcome {
    Succeeded { persisted: bool },
    Failed,
}

#[derive(Debug, Default)]
struct RunStats {
    processed: usize,
    succeeded: usize,
    failed: usize,
    persistence_failures: usize,
}

impl RunStats {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Succeeded { persisted } => {
                self.succeeded += 1;
                if !persisted {
                    self.persistence_failures += 1;
                }
            }
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

/// State owned by the background task for one run.
struct QueueRun {
    shared: Arc<Shared>,
    service: Arc<dyn CaptionService>,
    config: Arc<WorkerConfig>,
    policy: RetryPolicy,
    events: EventEmitter,
    log_path: PathBuf,
    /// Lent to a blocking task for each append; `None` only if that task panicked.
    writer: Option<Box<dyn BaseWriter + Send>>,
}

impl QueueRun {
    async fn run(mut self) -> RunSummary {
        let total = self.shared.queue().total;
        let log_path = self.log_path.clone();
        info!(total, log = %log_path.display(), service = self.service.name(), "Run started");
        self.events.status(format!(
            "Processing started ({} items). Results: {}",
            total,
            log_path.display()
        ));
        self.events.emit(WorkerEvent::Progress { processed: 0, total });

        let mut stats = RunStats::default();
        loop {
            if self.shared.is_cancelled() {
                break;
            }
            // A drained queue completes the run even with a pause pending.
            if self.shared.queue().pending.is_empty() {
                break;
            }
            if self.shared.is_paused() {
                self.wait_while_paused().await;
                if self.shared.is_cancelled() {
                    break;
                }
            }

            let next = {
                let mut queue = self.shared.queue();
                let item = queue.pending.pop_front();
                QUEUE_PENDING.set(queue.pending.len() as f64);
                item
            };
            let Some(item) = next else {
                break;
            };

            self.events.emit(WorkerEvent::CurrentItem(item.clone()));
            let span = info_span!("process_item", file = %item.file_name());
            let outcome = self.process_item(&item).instrument(span).await;
            stats.record(&outcome);

            let total = self.shared.queue().total;
            self.events.emit(WorkerEvent::Progress {
                processed: stats.processed,
                total,
            });

            // Give control-call tasks a chance to run before the next check point.
            tokio::task::yield_now().await;
        }

        if let Err(e) = self.with_writer(|writer| writer.close()).await {
            error!(error = %e, "Failed to close result log");
            self.events.status(format!("Warning: {}", e));
        }

        let cancelled = self.shared.is_cancelled();
        let summary = RunSummary {
            log_path,
            total: self.shared.queue().total,
            processed: stats.processed,
            succeeded: stats.succeeded,
            failed: stats.failed,
            persistence_failures: stats.persistence_failures,
            cancelled,
        };
        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled,
            "Run finished"
        );
        self.events.status(summary.to_string());

        // Cleared before `Completed` so a caller reacting to it can start again.
        self.shared.paused.store(false, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
        self.events.emit(WorkerEvent::Completed(summary.clone()));
        summary
    }

    /// Runs a log operation on the blocking pool; appends end in `sync_data`.
    async fn with_writer<T, F>(&mut self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn BaseWriter + Send>) -> Result<T> + Send + 'static,
    {
        let mut writer = self.writer.take().ok_or_else(|| {
            CaptionError::Persistence(format!(
                "Result log '{}' is unavailable",
                self.log_path.display()
            ))
        })?;
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = op(&mut writer);
            (writer, outcome)
        })
        .await;
        match joined {
            Ok((writer, outcome)) => {
                self.writer = Some(writer);
                outcome
            }
            Err(e) => Err(CaptionError::Persistence(format!(
                "Result log writer task failed: {}",
                e
            ))),
        }
    }

    async fn wait_while_paused(&mut self) {
        info!("Worker paused");
        self.events
            .status("Processing paused. Resume to continue.");
        let poll = Duration::from_millis(self.config.pause_poll_interval_ms);
        while self.shared.is_paused() && !self.shared.is_cancelled() {
            let _ = tokio::time::timeout(poll, self.shared.wake.notified()).await;
        }
        if !self.shared.is_cancelled() {
            info!("Worker resumed");
            self.events.status("Processing resumed.");
        }
    }

    async fn process_item(&mut self, item: &WorkItem) -> ItemOutcome {
        ACTIVE_ITEMS.inc();
        let timer = ITEM_PROCESSING_DURATION_SECONDS.start_timer();
        let outcome = self.process_item_inner(item).await;
        timer.observe_duration();
        ACTIVE_ITEMS.dec();
        ITEMS_PROCESSED_TOTAL.inc();
        outcome
    }

    async fn process_item_inner(&mut self, item: &WorkItem) -> ItemOutcome {
        let name = item.file_name();
        self.events.status(format!("Processing: {}", name));

        let image = match load_image(item).await {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Failed to read image");
                ITEMS_FAILED_TOTAL.with_label_values(&["input"]).inc();
                self.events.emit(WorkerEvent::Error {
                    item: item.clone(),
                    kind: ErrorKind::Input,
                    detail: format!("Failed to read image: {}", e),
                });
                return ItemOutcome::Failed;
            }
        };

        let size = image.bytes.len() as u64;
        if size > self.config.large_file_warning_bytes {
            let size_mb = size as f64 / (1024.0 * 1024.0);
            warn!(size_mb, "Image is very large");
            self.events.status(format!(
                "Warning: {} is very large ({:.2} MB); processing may take a while.",
                name, size_mb
            ));
        }

        let captions = match self.caption_with_retry(item, &image).await {
            Ok(captions) => captions,
            Err((err, attempts)) => {
                error!(kind = %err.kind, attempts, detail = %err.detail, "Giving up on image");
                ITEMS_FAILED_TOTAL
                    .with_label_values(&[err.kind.as_str()])
                    .inc();
                self.events.emit(WorkerEvent::Error {
                    item: item.clone(),
                    kind: ErrorKind::Service(err.kind),
                    detail: format!("failed after {} attempt(s): {}", attempts, err.detail),
                });
                return ItemOutcome::Failed;
            }
        };

        let max_sentences = self.config.max_sentences;
        let normalized = normalize_captions(&captions, max_sentences);
        if normalized.english.truncated {
            self.events.status(format!(
                "{} - English caption trimmed to {} sentences",
                name, max_sentences
            ));
        }
        if normalized.korean.truncated {
            self.events.status(format!(
                "{} - Korean caption trimmed to {} sentences",
                name, max_sentences
            ));
        }
        if normalized.is_short(max_sentences) {
            debug!(
                english = normalized.english.sentence_count,
                korean = normalized.korean.sentence_count,
                "Caption shorter than requested"
            );
            self.events.status(format!(
                "{} - Warning: caption has fewer than {} sentences",
                name, max_sentences
            ));
        }

        let result = ProcessingResult::success(item.clone(), normalized.captions);
        let record = result.to_record();
        let persisted = match self
            .with_writer(move |writer| writer.write_record(&record))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to append result");
                LOG_APPEND_ERRORS_TOTAL.inc();
                self.events.emit(WorkerEvent::Error {
                    item: item.clone(),
                    kind: ErrorKind::Persistence,
                    detail: e.to_string(),
                });
                false
            }
        };

        ITEMS_SUCCEEDED_TOTAL.inc();
        self.events.status(format!("Done: {}", name));
        self.events.emit(WorkerEvent::Result {
            item: item.clone(),
            result,
        });
        ItemOutcome::Succeeded { persisted }
    }

    /// Calls the service until it succeeds or the policy gives up. On failure
    /// returns the last error and the number of attempts made.
    async fn caption_with_retry(
        &mut self,
        item: &WorkItem,
        image: &ImagePayload,
    ) -> std::result::Result<CaptionText, (ServiceError, u32)> {
        let name = item.file_name();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, "Requesting captions");
            match self.service.caption(image, &self.config.prompt).await {
                Ok(captions) => return Ok(captions),
                Err(err) => match self.policy.decide(attempt, err.kind) {
                    RetryDecision::RetryAfter(delay) => {
                        SERVICE_RETRIES_TOTAL
                            .with_label_values(&[err.kind.as_str()])
                            .inc();
                        warn!(
                            attempt,
                            kind = %err.kind,
                            delay_ms = delay.as_millis() as u64,
                            "Captioning failed; retrying"
                        );
                        self.events.status(format!(
                            "{} - {}. Retrying in {:.1}s (attempt {}/{})",
                            name,
                            err,
                            delay.as_secs_f64(),
                            attempt,
                            max_attempts
                        ));
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => return Err((err, attempt)),
                },
            }
        }
    }
}
