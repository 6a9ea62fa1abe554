// tests/worker_tests.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{tempdir, TempDir};
use CaptionBlaster::config::{RetryConfig, WorkerConfig};
use CaptionBlaster::data_model::{CaptionText, ImagePayload, LogRecord, WorkItem};
use CaptionBlaster::error::{CaptionError, Result};
use CaptionBlaster::events::{ErrorKind, EventReceiver, RunSummary, WorkerEvent};
use CaptionBlaster::pipeline::writers::{read_records, BaseWriter};
use CaptionBlaster::service::{CaptionService, ServiceError, ServiceErrorKind};
use CaptionBlaster::worker_logic::TaskQueueWorker;

type Reply = Box<dyn Fn(usize) -> std::result::Result<CaptionText, ServiceError> + Send + Sync>;
type Hook = Box<dyn Fn(usize, &TaskQueueWorker) + Send + Sync>;

/// Scripted captioning service. Each image file holds its own name as bytes,
/// so the mock can record which image it was asked about.
struct MockService {
    reply: Reply,
    hook: Option<Hook>,
    worker: OnceLock<TaskQueueWorker>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl MockService {
    fn new(
        reply: impl Fn(usize) -> std::result::Result<CaptionText, ServiceError> + Send + Sync + 'static,
    ) -> Self {
        MockService {
            reply: Box::new(reply),
            hook: None,
            worker: OnceLock::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        }
    }

    fn always_ok() -> Self {
        Self::new(|_| Ok(captions()))
    }

    /// Runs `hook` with the call number (1-based) and the worker on every call.
    fn with_hook(mut self, hook: impl Fn(usize, &TaskQueueWorker) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptionService for MockService {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn caption(
        &self,
        image: &ImagePayload,
        _prompt: &str,
    ) -> std::result::Result<CaptionText, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&image.bytes).into_owned());
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
        if let (Some(hook), Some(worker)) = (&self.hook, self.worker.get()) {
            hook(call, worker);
        }
        (self.reply)(call)
    }
}

/// Log sink that fails on selected writes and keeps the rest in memory.
struct FlakyWriter {
    path: PathBuf,
    fail_on: Vec<usize>,
    writes: usize,
    stored: Arc<Mutex<Vec<LogRecord>>>,
}

impl BaseWriter for FlakyWriter {
    fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        self.writes += 1;
        if self.fail_on.contains(&self.writes) {
            return Err(CaptionError::Persistence("disk full".to_string()));
        }
        self.stored.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn captions() -> CaptionText {
    CaptionText {
        english_caption: "A dog runs. The grass is green. The sky is clear.".to_string(),
        korean_caption: "개가 달린다. 잔디가 푸르다. 하늘이 맑다.".to_string(),
    }
}

fn write_images(dir: &Path, names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            fs::write(&path, name.as_bytes()).unwrap();
            WorkItem::new(path)
        })
        .collect()
}

fn test_config(dir: &TempDir) -> WorkerConfig {
    WorkerConfig {
        log_file: Some(dir.path().join("captions.jsonl")),
        pause_poll_interval_ms: 20,
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 2000,
            ..RetryConfig::default()
        },
        ..WorkerConfig::default()
    }
}

fn build_worker(service: MockService, config: WorkerConfig) -> (TaskQueueWorker, Arc<MockService>, EventReceiver) {
    let service = Arc::new(service);
    let worker = TaskQueueWorker::new(service.clone(), config);
    let _ = service.worker.set(worker.clone());
    let events = worker.take_events().unwrap();
    (worker, service, events)
}

/// Drains events up to and including `Completed`.
async fn collect_run(events: &mut EventReceiver) -> Vec<WorkerEvent> {
    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        let done = matches!(event, WorkerEvent::Completed(_));
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

fn result_names(events: &[WorkerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Result { item, .. } => Some(item.file_name()),
            _ => None,
        })
        .collect()
}

fn errors(events: &[WorkerEvent]) -> Vec<(String, ErrorKind)> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Error { item, kind, .. } => Some((item.file_name(), *kind)),
            _ => None,
        })
        .collect()
}

fn summary(events: &[WorkerEvent]) -> RunSummary {
    match events.last() {
        Some(WorkerEvent::Completed(summary)) => summary.clone(),
        other => panic!("Expected Completed as last event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_processes_items_in_fifo_order() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["c.jpg", "a.png", "b.webp"]);
    let (worker, service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.seen(), vec!["c.jpg", "a.png", "b.webp"]);
    assert_eq!(result_names(&seen), vec!["c.jpg", "a.png", "b.webp"]);

    let records = read_records(&dir.path().join("captions.jsonl")).unwrap();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["c.jpg", "a.png", "b.webp"]);
    assert_eq!(records[0].text, captions());
    assert!(records[0].image_path.ends_with("/c.jpg"));

    let summary = summary(&seen);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 3);
    assert!(!summary.cancelled);

    let finished = worker.wait().await.unwrap();
    assert_eq!(finished, summary);
    assert!(!worker.is_running());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_total() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg", "3.jpg", "4.jpg"]);
    let (worker, _service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    let progress: Vec<(usize, usize)> = seen
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Progress { processed, total } => Some((*processed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.first(), Some(&(0, 4)));
    assert_eq!(progress.last(), Some(&(4, 4)));
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(progress.iter().all(|(_, total)| *total == 4));

    let completed = seen
        .iter()
        .filter(|e| matches!(e, WorkerEvent::Completed(_)))
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried_with_backoff_then_given_up() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["busy.jpg"]);
    let service = MockService::new(|_| Err(ServiceError::overloaded("servers are busy")));
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 3);
    let times = service.call_times.lock().unwrap().clone();
    assert!(times[1] - times[0] >= Duration::from_secs(2));
    assert!(times[2] - times[1] >= Duration::from_secs(4));

    assert_eq!(
        errors(&seen),
        vec![(
            "busy.jpg".to_string(),
            ErrorKind::Service(ServiceErrorKind::Overloaded)
        )]
    );
    assert!(result_names(&seen).is_empty());
    assert!(read_records(&dir.path().join("captions.jsonl"))
        .unwrap()
        .is_empty());

    let summary = summary(&seen);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_failure() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["slow.jpg"]);
    let service = MockService::new(|call| {
        if call == 1 {
            Err(ServiceError::timeout("request timed out"))
        } else {
            Ok(captions())
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 2);
    assert!(errors(&seen).is_empty());
    assert_eq!(result_names(&seen), vec!["slow.jpg"]);
}

#[tokio::test(start_paused = true)]
async fn test_unclassified_failure_retried_with_flat_delay() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["odd.jpg"]);
    let service = MockService::new(|call| {
        if call < 3 {
            Err(ServiceError::new(ServiceErrorKind::Unclassified, "connection reset"))
        } else {
            Ok(captions())
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 3);
    let times = service.call_times.lock().unwrap().clone();
    assert!(times[2] - times[1] >= Duration::from_secs(2));
    assert!(times[2] - times[1] < Duration::from_secs(4));
    assert_eq!(result_names(&seen), vec!["odd.jpg"]);
}

#[tokio::test]
async fn test_fatal_failure_not_retried() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["a.jpg", "b.jpg"]);
    let service = MockService::new(|call| {
        if call == 1 {
            Err(ServiceError::new(ServiceErrorKind::Authentication, "invalid x-api-key"))
        } else {
            Ok(captions())
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    // One call for a.jpg, one for b.jpg.
    assert_eq!(service.calls(), 2);
    assert_eq!(
        errors(&seen),
        vec![(
            "a.jpg".to_string(),
            ErrorKind::Service(ServiceErrorKind::Authentication)
        )]
    );
    assert_eq!(result_names(&seen), vec!["b.jpg"]);

    let summary = summary(&seen);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_incomplete_payload_not_retried_by_default() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["half.jpg"]);
    let service = MockService::new(|_| Err(ServiceError::incomplete("korean_caption missing")));
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(
        errors(&seen),
        vec![(
            "half.jpg".to_string(),
            ErrorKind::Service(ServiceErrorKind::IncompletePayload)
        )]
    );
}

#[tokio::test]
async fn test_incomplete_payload_retried_when_enabled() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["half.jpg"]);
    let service = MockService::new(|call| {
        if call == 1 {
            Err(ServiceError::incomplete("korean_caption missing"))
        } else {
            Ok(captions())
        }
    });
    let mut config = test_config(&dir);
    config.retry.retry_incomplete_payloads = true;
    let (worker, service, mut events) = build_worker(service, config);

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 2);
    assert_eq!(result_names(&seen), vec!["half.jpg"]);
}

#[tokio::test]
async fn test_cancel_during_second_item_stops_after_it() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"]);
    let service = MockService::always_ok().with_hook(|call, worker| {
        if call == 2 {
            worker.cancel();
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 2);
    assert_eq!(result_names(&seen), vec!["1.jpg", "2.jpg"]);
    assert_eq!(worker.pending_len(), 0);

    let summary = summary(&seen);
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.total, 5);

    let records = read_records(&dir.path().join("captions.jsonl")).unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_cancel_from_consumer_after_second_result() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"]);
    let (worker, service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();

    let mut seen = Vec::new();
    let mut results = 0;
    while let Some(event) = events.recv().await {
        if matches!(event, WorkerEvent::Result { .. }) {
            results += 1;
            if results == 2 {
                worker.cancel();
            }
        }
        let done = matches!(event, WorkerEvent::Completed(_));
        seen.push(event);
        if done {
            break;
        }
    }

    assert_eq!(service.calls(), 2);
    assert_eq!(result_names(&seen), vec!["1.jpg", "2.jpg"]);
    assert!(errors(&seen).is_empty());

    let summary = summary(&seen);
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 2);
    assert_eq!(read_records(&dir.path().join("captions.jsonl")).unwrap().len(), 2);
}

#[tokio::test]
async fn test_pause_during_last_item_still_completes() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg"]);
    let service = MockService::always_ok().with_hook(|call, worker| {
        if call == 2 {
            worker.pause();
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(2), collect_run(&mut events))
        .await
        .expect("run should complete without a resume");

    assert_eq!(service.calls(), 2);
    assert_eq!(result_names(&seen), vec!["1.jpg", "2.jpg"]);
    assert!(!seen
        .iter()
        .any(|e| matches!(e, WorkerEvent::Status(msg) if msg.starts_with("Processing paused"))));

    let summary = summary(&seen);
    assert!(!summary.cancelled);
    assert_eq!(summary.processed, 2);

    worker.wait().await.unwrap();
    assert!(!worker.is_running());
    assert!(!worker.is_paused());
}

#[tokio::test]
async fn test_pause_holds_queue_until_resume() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg", "3.jpg"]);
    let service = MockService::always_ok().with_hook(|call, worker| {
        if call == 1 {
            worker.pause();
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();

    // The item in flight finishes before the worker parks.
    let mut before_pause = Vec::new();
    while let Some(event) = events.recv().await {
        let parked = matches!(&event, WorkerEvent::Status(msg) if msg.starts_with("Processing paused"));
        before_pause.push(event);
        if parked {
            break;
        }
    }
    assert_eq!(result_names(&before_pause), vec!["1.jpg"]);
    assert!(worker.is_paused());
    assert!(worker.is_running());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.calls(), 1);
    assert_eq!(worker.pending_len(), 2);

    worker.resume();
    let rest = collect_run(&mut events).await;
    assert_eq!(service.calls(), 3);
    assert_eq!(result_names(&rest), vec!["2.jpg", "3.jpg"]);
    assert!(!summary(&rest).cancelled);
}

#[tokio::test]
async fn test_cancel_while_paused_ends_run() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg"]);
    let service = MockService::always_ok().with_hook(|call, worker| {
        if call == 1 {
            worker.pause();
        }
    });
    let (worker, service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    while let Some(event) = events.recv().await {
        if matches!(&event, WorkerEvent::Status(msg) if msg.starts_with("Processing paused")) {
            break;
        }
    }

    worker.cancel();
    let rest = collect_run(&mut events).await;
    assert_eq!(service.calls(), 1);
    let summary = summary(&rest);
    assert!(summary.cancelled);
    assert_eq!(summary.processed, 1);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg"]);
    let (worker, service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    assert!(matches!(worker.start(), Err(CaptionError::AlreadyRunning)));

    let seen = collect_run(&mut events).await;
    assert_eq!(service.calls(), 2);
    assert_eq!(summary(&seen).processed, 2);
}

#[tokio::test]
async fn test_start_with_empty_queue_fails() {
    let dir = tempdir().unwrap();
    let (worker, _service, _events) = build_worker(MockService::always_ok(), test_config(&dir));

    let err = worker.start().unwrap_err();
    assert!(matches!(err, CaptionError::NoWork));
    assert!(err.is_state_error());
    assert!(!worker.is_running());
}

#[tokio::test]
async fn test_controls_are_noops_when_idle() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg"]);
    let (worker, service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.cancel();
    worker.pause();
    worker.resume();
    assert!(!worker.is_paused());

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;
    assert_eq!(service.calls(), 1);
    assert!(!summary(&seen).cancelled);
}

#[tokio::test]
async fn test_second_run_appends_to_same_log() {
    let dir = tempdir().unwrap();
    let first = write_images(dir.path(), &["1.jpg"]);
    let second = write_images(dir.path(), &["2.jpg", "3.jpg"]);
    let (worker, _service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(first);
    worker.start().unwrap();
    collect_run(&mut events).await;
    worker.wait().await.unwrap();

    worker.enqueue_all(second);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;
    assert_eq!(summary(&seen).total, 2);

    let records = read_records(&dir.path().join("captions.jsonl")).unwrap();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["1.jpg", "2.jpg", "3.jpg"]);
}

#[tokio::test]
async fn test_persistence_failure_reported_and_run_continues() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg", "2.jpg", "3.jpg"]);
    let (worker, _service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    let stored = Arc::new(Mutex::new(Vec::new()));
    let writer = FlakyWriter {
        path: dir.path().join("memory.jsonl"),
        fail_on: vec![1],
        writes: 0,
        stored: Arc::clone(&stored),
    };

    worker.enqueue_all(items);
    worker.start_with_writer(Box::new(writer)).unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(errors(&seen), vec![("1.jpg".to_string(), ErrorKind::Persistence)]);
    // The caption is still delivered to the caller.
    assert_eq!(result_names(&seen), vec!["1.jpg", "2.jpg", "3.jpg"]);
    assert_eq!(stored.lock().unwrap().len(), 2);

    let summary = summary(&seen);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.persistence_failures, 1);
    assert_eq!(summary.log_path, dir.path().join("memory.jsonl"));
}

#[tokio::test]
async fn test_unreadable_image_reported_as_input_error() {
    let dir = tempdir().unwrap();
    let mut items = vec![WorkItem::new(dir.path().join("missing.jpg"))];
    items.extend(write_images(dir.path(), &["ok.jpg"]));
    let (worker, service, mut events) = build_worker(MockService::always_ok(), test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(errors(&seen), vec![("missing.jpg".to_string(), ErrorKind::Input)]);
    assert_eq!(result_names(&seen), vec!["ok.jpg"]);
    assert_eq!(summary(&seen).failed, 1);
}

#[tokio::test]
async fn test_long_captions_truncated_before_logging() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["wordy.jpg"]);
    let service = MockService::new(|_| {
        Ok(CaptionText {
            english_caption: "One. Two. Three. Four. Five.".to_string(),
            korean_caption: "하나. 둘. 셋. 넷.".to_string(),
        })
    });
    let (worker, _service, mut events) = build_worker(service, test_config(&dir));

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    let records = read_records(&dir.path().join("captions.jsonl")).unwrap();
    assert_eq!(records[0].text.english_caption, "One. Two. Three.");
    assert_eq!(records[0].text.korean_caption, "하나. 둘. 셋.");
    assert!(seen.iter().any(
        |e| matches!(e, WorkerEvent::Status(msg) if msg.contains("trimmed to 3 sentences"))
    ));
}

#[tokio::test]
async fn test_log_open_failure_fails_start() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, b"x").unwrap();
    let items = write_images(dir.path(), &["1.jpg"]);

    let mut config = test_config(&dir);
    config.log_file = Some(blocker.join("captions.jsonl"));
    let (worker, service, _events) = build_worker(MockService::always_ok(), config);

    worker.enqueue_all(items);
    assert!(matches!(worker.start(), Err(CaptionError::Persistence(_))));
    assert!(!worker.is_running());
    assert_eq!(worker.pending_len(), 1);
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn test_default_log_name_in_output_dir() {
    let dir = tempdir().unwrap();
    let items = write_images(dir.path(), &["1.jpg"]);
    let out_dir = dir.path().join("out");
    let config = WorkerConfig {
        output_dir: out_dir.clone(),
        log_file: None,
        ..test_config(&dir)
    };
    let (worker, _service, mut events) = build_worker(MockService::always_ok(), config);

    worker.enqueue_all(items);
    worker.start().unwrap();
    let seen = collect_run(&mut events).await;

    let log_path = summary(&seen).log_path;
    assert_eq!(log_path.parent(), Some(out_dir.as_path()));
    let name = log_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("captions_") && name.ends_with(".jsonl"));
    assert_eq!(read_records(&log_path).unwrap().len(), 1);
}
