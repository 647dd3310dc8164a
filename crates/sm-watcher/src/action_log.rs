//! The operator-visible action log.
//!
//! One human-readable line per event and per outcome. Lines from different
//! watchers interleave in whatever order they are written; they are
//! diagnostics, not state.
//!
//! Diagnostic tracing (`tracing` macros) is separate and goes wherever the
//! binary's subscriber sends it.

use std::fmt::Display;
use std::io::Write;

use camino::Utf8Path;
use parking_lot::Mutex;

use crate::events::{ChangeEvent, ChangeKind};
use crate::mirror::CopyTask;

/// Sink for action log lines.
pub trait ActionLogger: Send + Sync {
    /// Appends one line.
    fn log(&self, line: &str);
}

/// Writes each line to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger;

impl ConsoleLogger {
    /// Creates a console logger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ActionLogger for ConsoleLogger {
    fn log(&self, line: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{line}");
    }
}

/// Keeps every line in memory.
///
/// ```
/// use sm_watcher::{ActionLogger, MemoryLogger};
///
/// let logger = MemoryLogger::new();
/// logger.log("File /src/a/x.cs was created");
/// assert_eq!(logger.len(), 1);
/// assert!(logger.contains("was created"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    /// Creates an empty logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all lines logged so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns the number of lines logged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    /// Returns `true` if nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Returns `true` if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

impl ActionLogger for MemoryLogger {
    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_owned());
    }
}

impl<L: ActionLogger + ?Sized> ActionLogger for std::sync::Arc<L> {
    fn log(&self, line: &str) {
        (**self).log(line);
    }
}

/// Describes a change event.
#[must_use]
pub fn describe(event: &ChangeEvent) -> String {
    match &event.kind {
        ChangeKind::Created(path) | ChangeKind::Changed(path) | ChangeKind::Deleted(path) => {
            format!("File {path} was {}", event.label())
        }
        ChangeKind::Renamed { from, to } => format!("File {from} was renamed to {to}"),
        ChangeKind::Error(detail) => format!("Error: {detail}"),
    }
}

/// Announces a copy before it happens.
#[must_use]
pub fn copying(task: &CopyTask) -> String {
    format!("Copying {} to {}", task.source, task.destination)
}

/// Announces a watcher that is now observing.
#[must_use]
pub fn watching(root: &Utf8Path, pattern: &str) -> String {
    format!("Watching {root} for {pattern} files")
}

/// Reports a watcher that could not be established.
#[must_use]
pub fn subscription_failed(pattern: &str, error: &dyn Display) -> String {
    format!("Failed to watch {pattern} files: {error}")
}

/// Reports an abandoned copy.
#[must_use]
pub fn mirror_failed(path: &Utf8Path, error: &dyn Display) -> String {
    format!("Failed to mirror {path}: {error}")
}

/// Reports an event whose handling aborted unexpectedly.
#[must_use]
pub fn handler_failed(pattern: &str, error: &dyn Display) -> String {
    format!("Failed to handle {pattern} event: {error}")
}
