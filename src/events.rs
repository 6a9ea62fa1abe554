// src/events.rs

use crate::data_model::{ProcessingResult, WorkItem};
use crate::service::ServiceErrorKind;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Why an item ended up in an `Error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The captioning service failed (after retries, where applicable).
    Service(ServiceErrorKind),
    /// The image could not be loaded from disk.
    Input,
    /// The result could not be appended to the log.
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Service(kind) => write!(f, "service/{}", kind),
            ErrorKind::Input => write!(f, "input"),
            ErrorKind::Persistence => write!(f, "persistence"),
        }
    }
}

/// Final report of one run, carried by `WorkerEvent::Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub log_path: PathBuf,
    pub total: usize,
    /// Items that finished, successfully or not.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub persistence_failures: usize,
    pub cancelled: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cancelled {
            write!(
                f,
                "Cancelled after {} of {} items ({} succeeded, {} failed). Results: {}",
                self.processed,
                self.total,
                self.succeeded,
                self.failed,
                self.log_path.display()
            )
        } else {
            write!(
                f,
                "Processed {} items ({} succeeded, {} failed). Results: {}",
                self.processed,
                self.succeeded,
                self.failed,
                self.log_path.display()
            )
        }
    }
}

/// Everything the worker tells its caller. Delivered over a channel so the
/// caller consumes them on its own context.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Progress { processed: usize, total: usize },
    CurrentItem(WorkItem),
    Status(String),
    Result {
        item: WorkItem,
        result: ProcessingResult,
    },
    Error {
        item: WorkItem,
        kind: ErrorKind,
        detail: String,
    },
    Completed(RunSummary),
}

pub type EventSender = mpsc::UnboundedSender<WorkerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<WorkerEvent>;

/// Thin wrapper so a dropped receiver never takes the worker down.
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: EventSender,
}

impl EventEmitter {
    pub(crate) fn new(tx: EventSender) -> Self {
        EventEmitter { tx }
    }

    pub(crate) fn emit(&self, event: WorkerEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped; event discarded");
        }
    }

    pub(crate) fn status(&self, message: impl Into<String>) {
        self.emit(WorkerEvent::Status(message.into()));
    }
}
