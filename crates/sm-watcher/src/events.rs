//! Change events and their translation from raw notify events.
//!
//! # Event Flow
//!
//! ```text
//! File System Change
//!        │
//!        ▼
//! notify::Event (OS notification thread)
//!        │
//!        ▼ channel
//! FilterWatcher::run
//!        │
//!        ▼
//! EventTranslator (kind mapping, rename pairing, filtering)
//!        │
//!        ▼
//! ChangeEvent ──► EventRouter
//! ```

use std::path::PathBuf;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use smallvec::SmallVec;

use crate::error::WatchError;
use crate::filter::FileFilter;

/// Detail attached to the error event emitted when the OS drops notifications.
const OVERFLOW_DETAIL: &str = "notification queue overflowed; some changes may have been missed";

/// What happened to a watched entity.
///
/// A closed set: the event router handles every variant in one exhaustive
/// match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// A file appeared.
    Created(Utf8PathBuf),

    /// A file's contents or metadata changed.
    Changed(Utf8PathBuf),

    /// A file was renamed or moved within the watch root.
    Renamed {
        /// Full path before the rename.
        from: Utf8PathBuf,
        /// Full path after the rename.
        to: Utf8PathBuf,
    },

    /// A file was removed.
    Deleted(Utf8PathBuf),

    /// Monitoring itself hit a problem (overflow, inaccessible path, ...).
    Error(String),
}

/// A change notification delivered to the event router.
///
/// # Examples
///
/// ```
/// use sm_watcher::ChangeEvent;
/// use camino::Utf8PathBuf;
///
/// let event = ChangeEvent::changed(Utf8PathBuf::from("/src/a/x.cs"));
/// assert_eq!(event.label(), "changed");
/// assert_eq!(event.path().map(|p| p.as_str()), Some("/src/a/x.cs"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,

    /// When the event arrived. Only used for ordering.
    pub timestamp: Instant,
}

impl ChangeEvent {
    /// Creates an event of the given kind, stamped now.
    #[inline]
    #[must_use]
    pub fn new(kind: ChangeKind) -> Self {
        Self {
            kind,
            timestamp: Instant::now(),
        }
    }

    /// A [`ChangeKind::Created`] event.
    #[must_use]
    pub fn created(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Created(path.into()))
    }

    /// A [`ChangeKind::Changed`] event.
    #[must_use]
    pub fn changed(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Changed(path.into()))
    }

    /// A [`ChangeKind::Renamed`] event.
    #[must_use]
    pub fn renamed(from: impl Into<Utf8PathBuf>, to: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Renamed {
            from: from.into(),
            to: to.into(),
        })
    }

    /// A [`ChangeKind::Deleted`] event.
    #[must_use]
    pub fn deleted(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(ChangeKind::Deleted(path.into()))
    }

    /// A [`ChangeKind::Error`] event.
    #[must_use]
    pub fn error(detail: impl Into<String>) -> Self {
        Self::new(ChangeKind::Error(detail.into()))
    }

    /// The affected path. For renames this is the new path.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match &self.kind {
            ChangeKind::Created(path) | ChangeKind::Changed(path) | ChangeKind::Deleted(path) => {
                Some(path)
            }
            ChangeKind::Renamed { to, .. } => Some(to),
            ChangeKind::Error(_) => None,
        }
    }

    /// The path before a rename.
    #[must_use]
    pub fn previous_path(&self) -> Option<&Utf8Path> {
        match &self.kind {
            ChangeKind::Renamed { from, .. } => Some(from),
            _ => None,
        }
    }

    /// The error detail of an error event.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        match &self.kind {
            ChangeKind::Error(detail) => Some(detail),
            _ => None,
        }
    }

    /// Lower-case name of the kind, as used in the action log.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self.kind {
            ChangeKind::Created(_) => "created",
            ChangeKind::Changed(_) => "changed",
            ChangeKind::Renamed { .. } => "renamed",
            ChangeKind::Deleted(_) => "deleted",
            ChangeKind::Error(_) => "error",
        }
    }
}

/// Turns raw notify events into filtered [`ChangeEvent`]s.
///
/// Owned by a single watcher's run loop, so its rename bookkeeping is never
/// shared. Backends differ in how they report renames:
///
/// - inotify sends `Name(From)`, `Name(To)` and then `Name(Both)` for one move
/// - Windows sends `Name(From)` followed by `Name(To)`
/// - FSEvents and kqueue send `Name(Any)` per affected path
///
/// The translator pairs `From`/`To` into one rename and drops the `Both` that
/// repeats it. A `From` that is not followed by a `To` means the file left
/// the tree and is reported as deleted, either when the next unrelated event
/// arrives or when the owner calls [`EventTranslator::flush`] after a quiet
/// period. A `To` without a `From` means it arrived from outside and is
/// reported as created.
pub struct EventTranslator<F> {
    filter: F,
    excluded: Option<Utf8PathBuf>,
    pending_from: Option<Utf8PathBuf>,
    last_pair: Option<(Utf8PathBuf, Utf8PathBuf)>,
}

impl<F: FileFilter> EventTranslator<F> {
    /// Creates a translator applying `filter` to event paths.
    pub const fn new(filter: F) -> Self {
        Self {
            filter,
            excluded: None,
            pending_from: None,
            last_pair: None,
        }
    }

    /// Drops every event whose paths all lie under `dir`.
    ///
    /// Used for the output root when it sits inside the watch root, so that
    /// mirrored copies do not trigger further copies.
    #[must_use]
    pub fn excluding(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.excluded = Some(dir.into());
        self
    }

    /// Translates one notify event into zero or more change events.
    pub fn translate(&mut self, event: notify::Event) -> SmallVec<[ChangeEvent; 2]> {
        let mut out = SmallVec::new();

        if event.need_rescan() {
            out.push(ChangeEvent::error(OVERFLOW_DETAIL));
        }

        let continues_rename = matches!(
            event.kind,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
        );
        if !continues_rename {
            self.flush_pending(&mut out);
            self.last_pair = None;
        }

        let paths = event.paths.into_iter().filter_map(to_utf8);

        match event.kind {
            EventKind::Create(_) => {
                for path in paths {
                    self.emit(&mut out, ChangeEvent::created(path));
                }
            }
            EventKind::Modify(ModifyKind::Name(mode)) => self.translate_rename(mode, paths, &mut out),
            EventKind::Modify(_) => {
                for path in paths {
                    self.emit(&mut out, ChangeEvent::changed(path));
                }
            }
            EventKind::Remove(_) => {
                for path in paths {
                    self.emit(&mut out, ChangeEvent::deleted(path));
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {
                tracing::trace!(kind = ?event.kind, "Ignoring notify event");
            }
        }

        out
    }

    /// Translates a notify error into an error event.
    #[allow(clippy::unused_self)] // Consistency with translate()
    pub fn translate_error(&self, error: &notify::Error) -> ChangeEvent {
        ChangeEvent::error(error.to_string())
    }

    /// Returns `true` while a `From` half is waiting for its `To`.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending_from.is_some()
    }

    /// Gives up on a pending `From` half and reports it as deleted.
    pub fn flush(&mut self) -> SmallVec<[ChangeEvent; 2]> {
        let mut out = SmallVec::new();
        self.flush_pending(&mut out);
        out
    }

    fn flush_pending(&mut self, out: &mut SmallVec<[ChangeEvent; 2]>) {
        if let Some(from) = self.pending_from.take() {
            self.emit(out, ChangeEvent::deleted(from));
        }
    }

    fn translate_rename(
        &mut self,
        mode: RenameMode,
        paths: impl Iterator<Item = Utf8PathBuf>,
        out: &mut SmallVec<[ChangeEvent; 2]>,
    ) {
        match mode {
            RenameMode::From => {
                for path in paths {
                    self.flush_pending(out);
                    self.pending_from = Some(path);
                }
            }
            RenameMode::To => {
                for to in paths {
                    if let Some(from) = self.pending_from.take() {
                        self.last_pair = Some((from.clone(), to.clone()));
                        self.emit(out, ChangeEvent::renamed(from, to));
                    } else {
                        self.emit(out, ChangeEvent::created(to));
                    }
                }
            }
            RenameMode::Both => {
                let paths: SmallVec<[Utf8PathBuf; 2]> = paths.collect();
                let [from, to] = paths.as_slice() else {
                    tracing::debug!(count = paths.len(), "Ignoring rename without two paths");
                    return;
                };
                let pair = (from.clone(), to.clone());
                if self.last_pair.take().as_ref() == Some(&pair) {
                    return;
                }
                self.pending_from = None;
                self.emit(out, ChangeEvent::renamed(pair.0, pair.1));
            }
            RenameMode::Any | RenameMode::Other => {
                for path in paths {
                    let event = if path.exists() {
                        ChangeEvent::changed(path)
                    } else {
                        ChangeEvent::deleted(path)
                    };
                    self.emit(out, event);
                }
            }
        }
    }

    fn emit(&self, out: &mut SmallVec<[ChangeEvent; 2]>, event: ChangeEvent) {
        if self.accepts(&event) {
            out.push(event);
        } else {
            tracing::trace!(?event.kind, "Filtered out change event");
        }
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        match &event.kind {
            ChangeKind::Error(_) => true,
            ChangeKind::Renamed { from, to } => {
                (self.is_included(from) || self.is_included(to))
                    && (self.filter.should_process(from) || self.filter.should_process(to))
            }
            ChangeKind::Created(path) | ChangeKind::Changed(path) | ChangeKind::Deleted(path) => {
                self.is_included(path) && self.filter.should_process(path)
            }
        }
    }

    fn is_included(&self, path: &Utf8Path) -> bool {
        self.excluded
            .as_deref()
            .is_none_or(|excluded| !path.starts_with(excluded))
    }
}

fn to_utf8(path: PathBuf) -> Option<Utf8PathBuf> {
    match Utf8PathBuf::try_from(path) {
        Ok(path) => Some(path),
        Err(e) => {
            let error = WatchError::non_utf8_path(e.into_path_buf());
            tracing::warn!(error = %error, "Skipping file event");
            None
        }
    }
}
