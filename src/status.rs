use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::ingest_use_case::BatchReport;

/// Severity tag carried with every status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
    Summary,
}

/// Short human-readable progress line for the operator surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusLine {
    pub fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Messages sent from the background worker to the interactive surface
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Status(StatusLine),
    Finished(BatchReport),
}

/// Destination for diagnostics and progress lines.
pub trait StatusSink: Send + Sync {
    fn push(&self, line: StatusLine);

    fn info(&self, message: &str) {
        self.push(StatusLine::new(StatusLevel::Info, message));
    }

    fn success(&self, message: &str) {
        self.push(StatusLine::new(StatusLevel::Success, message));
    }

    fn warning(&self, message: &str) {
        self.push(StatusLine::new(StatusLevel::Warning, message));
    }

    fn error(&self, message: &str) {
        self.push(StatusLine::new(StatusLevel::Error, message));
    }
}

impl StatusSink for UnboundedSender<WorkerEvent> {
    fn push(&self, line: StatusLine) {
        // The receiver going away only means nobody is watching any more
        let _ = self.send(WorkerEvent::Status(line));
    }
}

/// Collects lines in memory; used by `check` and by tests.
#[derive(Debug, Default)]
pub struct StatusBuffer {
    lines: Mutex<Vec<StatusLine>>,
}

impl StatusBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.message).collect()
    }
}

impl StatusSink for StatusBuffer {
    fn push(&self, line: StatusLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}
