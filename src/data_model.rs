use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One unit of work: the path of an image to caption.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    path: PathBuf,
}

impl WorkItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WorkItem { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base file name, falling back to the whole path when there is none.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }

    /// The path with every backslash turned into a forward slash.
    pub fn normalized_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<PathBuf> for WorkItem {
    fn from(path: PathBuf) -> Self {
        WorkItem::new(path)
    }
}

/// Raw image bytes plus the media type announced to the captioning service.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// The two captions the service must return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionText {
    pub english_caption: String,
    pub korean_caption: String,
}

/// Outcome of a successful external call, after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub source_ref: WorkItem,
    pub payload: CaptionText,
    pub succeeded: bool,
}

impl ProcessingResult {
    pub fn success(source_ref: WorkItem, payload: CaptionText) -> Self {
        ProcessingResult {
            source_ref,
            payload,
            succeeded: true,
        }
    }

    /// The line-level record written to the result log.
    pub fn to_record(&self) -> LogRecord {
        LogRecord {
            content: self.source_ref.file_name(),
            image_path: self.source_ref.normalized_path(),
            text: self.payload.clone(),
        }
    }
}

/// One JSONL line of the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub content: String,
    pub image_path: String,
    pub text: CaptionText,
}
