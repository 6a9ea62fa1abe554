pub mod base_writer;
pub mod jsonl_writer;

pub use base_writer::BaseWriter;
pub use jsonl_writer::{default_log_path, ensure_jsonl_extension, read_records, JsonlWriter};
