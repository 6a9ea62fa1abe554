use crate::data_model::LogRecord;
use crate::error::Result;
use std::path::Path;

/// Trait for append-only sinks of result records (e.g. a JSONL file).
pub trait BaseWriter {
    /// Durably append one record. Earlier records are never touched.
    fn write_record(&mut self, record: &LogRecord) -> Result<()>;

    /// Where the records end up, for summaries.
    fn location(&self) -> &Path;

    /// Flush and release the sink.
    fn close(&mut self) -> Result<()>;
}
