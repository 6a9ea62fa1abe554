// Utils

pub mod common;
pub mod prometheus_metrics;
pub mod text;

pub use text::{normalize_captions, split_into_sentences, truncate_sentences};
