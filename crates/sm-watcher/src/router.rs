//! Per-event dispatch.
//!
//! Every event is first described in the action log. A `Changed` event for a
//! file is then mirrored into the output root; every other event stops there.
//!
//! Failures never escape [`EventRouter::handle`]: they are written to the
//! action log and the router moves on to the next event.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::action_log::{self, ActionLogger};
use crate::error::MirrorError;
use crate::events::{ChangeEvent, ChangeKind};
use crate::mirror::CopyTask;

/// What handling one event amounted to.
#[derive(Debug)]
pub enum RouteOutcome {
    /// The event was only logged.
    Logged,

    /// The file was mirrored.
    Copied(CopyTask),

    /// Mirroring was attempted and abandoned.
    Failed(MirrorError),
}

impl RouteOutcome {
    /// Returns `true` if a copy was made.
    #[must_use]
    pub const fn is_copied(&self) -> bool {
        matches!(self, Self::Copied(_))
    }

    /// Returns `true` if a copy was attempted and failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Dispatches change events to their handling.
///
/// Shared by every filter watcher. Holds no per-event state, so concurrent
/// calls from different watchers are independent.
pub struct EventRouter {
    out_root: Utf8PathBuf,
    logger: Arc<dyn ActionLogger>,
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("out_root", &self.out_root)
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Creates a router mirroring into `out_root`.
    pub fn new(out_root: impl Into<Utf8PathBuf>, logger: Arc<dyn ActionLogger>) -> Self {
        Self {
            out_root: out_root.into(),
            logger,
        }
    }

    /// The output root copies land under.
    #[must_use]
    pub fn out_root(&self) -> &Utf8Path {
        &self.out_root
    }

    /// The action log this router writes to.
    #[must_use]
    pub fn logger(&self) -> &Arc<dyn ActionLogger> {
        &self.logger
    }

    /// Handles one event.
    pub fn handle(&self, event: &ChangeEvent) -> RouteOutcome {
        self.logger.log(&action_log::describe(event));

        match &event.kind {
            ChangeKind::Changed(path) => self.mirror(path),
            ChangeKind::Created(_)
            | ChangeKind::Renamed { .. }
            | ChangeKind::Deleted(_)
            | ChangeKind::Error(_) => RouteOutcome::Logged,
        }
    }

    fn mirror(&self, source: &Utf8Path) -> RouteOutcome {
        // Directories can carry a matching name (`lib.dll/`).
        if source.is_dir() {
            tracing::debug!(path = %source, "Skipping directory");
            return RouteOutcome::Logged;
        }

        let task = match CopyTask::resolve(source, &self.out_root) {
            Ok(task) => task,
            Err(error) => return self.abandon(error),
        };

        // Only possible when the output root is the watch root.
        if task.destination == task.source {
            tracing::debug!(path = %source, "File is its own mirror");
            return RouteOutcome::Logged;
        }

        self.logger.log(&action_log::copying(&task));
        match task.execute() {
            Ok(bytes) => {
                tracing::debug!(source = %task.source, destination = %task.destination, bytes, "Mirrored file");
                RouteOutcome::Copied(task)
            }
            Err(error) => self.abandon(error),
        }
    }

    fn abandon(&self, error: MirrorError) -> RouteOutcome {
        let path = error.source_path();
        tracing::warn!(path = %path, error = %error, "Failed to mirror file");
        self.logger.log(&action_log::mirror_failed(path, &error));
        RouteOutcome::Failed(error)
    }
}
