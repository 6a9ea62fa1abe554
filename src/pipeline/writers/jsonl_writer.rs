use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, error};

use crate::data_model::LogRecord;
use crate::error::{CaptionError, Result};
use crate::pipeline::writers::BaseWriter;

/// `captions_<YYYYmmdd_HHMMSS>.jsonl` inside `dir`.
pub fn default_log_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("captions_{}.jsonl", now.format("%Y%m%d_%H%M%S")))
}

/// Appends `.jsonl` unless the path already ends with it (any case).
pub fn ensure_jsonl_extension(path: PathBuf) -> PathBuf {
    let has_ext = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
    if has_ext {
        path
    } else {
        let mut raw = path.into_os_string();
        raw.push(".jsonl");
        PathBuf::from(raw)
    }
}

/// Append-only JSONL result log. One record per line, synced after every write.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlWriter {
    /// Opens (creating if needed) the log for appending. Existing lines are kept.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence_error(&path, "create directory", e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| persistence_error(&path, "open", e))?;
        debug!(path = %path.display(), "Result log opened");
        Ok(JsonlWriter {
            path,
            file: Some(file),
        })
    }
}

fn persistence_error(path: &Path, action: &str, err: std::io::Error) -> CaptionError {
    CaptionError::Persistence(format!(
        "Failed to {} result log '{}': {}",
        action,
        path.display(),
        err
    ))
}

/// A sink that can be rolled back to an earlier length.
trait AppendTarget: Write {
    fn end_offset(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn end_offset(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes one whole line or nothing. On a failed write or sync the target is
/// cut back to its previous end, so a torn fragment never prefixes the next line.
fn append_line<T: AppendTarget>(target: &mut T, line: &[u8]) -> io::Result<()> {
    let start = target.end_offset()?;
    let written = target.write_all(line).and_then(|_| target.sync());
    if let Err(e) = written {
        if let Err(rollback) = target.truncate_to(start) {
            error!(error = %rollback, offset = start, "Failed to roll back partial log line");
        }
        return Err(e);
    }
    Ok(())
}

impl BaseWriter for JsonlWriter {
    fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            CaptionError::Persistence(format!("Result log '{}' is closed", self.path.display()))
        })?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        append_line(file, line.as_bytes())
            .map_err(|e| persistence_error(&self.path, "append to", e))
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()
                .map_err(|e| persistence_error(&self.path, "close", e))?;
        }
        Ok(())
    }
}

/// Reads a result log back. Blank lines are ignored; a malformed line is an error.
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let file = File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
