// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Gauge, Histogram,
};

pub static ITEMS_PROCESSED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "caption_worker_items_processed_total",
        "Total number of images that finished processing (success or failure)."
    )
    .expect("Failed to register caption_worker_items_processed_total counter")
});

pub static ITEMS_SUCCEEDED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "caption_worker_items_succeeded_total",
        "Total number of images captioned successfully."
    )
    .expect("Failed to register caption_worker_items_succeeded_total counter")
});

pub static ITEMS_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "caption_worker_items_failed_total",
        "Total number of images abandoned, by failure kind.",
        &["kind"]
    )
    .expect("Failed to register caption_worker_items_failed_total counter")
});

pub static ITEMS_DISCARDED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "caption_worker_items_discarded_total",
        "Total number of pending images dropped by cancellation."
    )
    .expect("Failed to register caption_worker_items_discarded_total counter")
});

pub static SERVICE_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "caption_worker_service_retries_total",
        "Total number of retried captioning calls, by failure kind.",
        &["kind"]
    )
    .expect("Failed to register caption_worker_service_retries_total counter")
});

pub static LOG_APPEND_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "caption_worker_log_append_errors_total",
        "Total number of failed result log appends."
    )
    .expect("Failed to register caption_worker_log_append_errors_total counter")
});

pub static ITEM_PROCESSING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "caption_worker_item_processing_duration_seconds",
        "Histogram of per-image processing durations, retries included."
    )
    .expect("Failed to register caption_worker_item_processing_duration_seconds histogram")
});

pub static ACTIVE_ITEMS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "caption_worker_active_items",
        "Number of images currently being processed."
    )
    .expect("Failed to register caption_worker_active_items gauge")
});

pub static QUEUE_PENDING: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "caption_worker_queue_pending",
        "Number of images waiting in the queue."
    )
    .expect("Failed to register caption_worker_queue_pending gauge")
});
