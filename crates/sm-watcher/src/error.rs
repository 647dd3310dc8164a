//! Error types for the sm-watcher crate.
//!
//! - [`WatchError`] covers establishing and running a subscription.
//! - [`MirrorError`] covers mirroring a single changed file.
//!
//! Neither ever terminates the process: a [`WatchError`] abandons one filter's
//! watcher, a [`MirrorError`] abandons one event's copy.

use camino::{Utf8Path, Utf8PathBuf};

/// Errors that can occur while establishing or operating a filter watcher.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): abandon this filter's watcher
/// - **Path not found** ([`WatchError::PathNotFound`]): abandon this filter's watcher
/// - **Invalid pattern** ([`WatchError::InvalidPattern`]): abandon this filter's watcher
/// - **Channel closed** ([`WatchError::ChannelClosed`]): reported as an error event, the watcher stops
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): skip the event and continue
/// - **I/O errors** ([`WatchError::Io`]): abandon this filter's watcher
///
/// # Examples
///
/// ```
/// use sm_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::Notify(e) => eprintln!("Notify error: {e}"),
///         WatchError::PathNotFound(p) => eprintln!("Path not found: {p}"),
///         WatchError::InvalidPattern { pattern, .. } => eprintln!("Bad filter: {pattern}"),
///         WatchError::ChannelClosed => eprintln!("Channel closed"),
///         WatchError::NonUtf8Path(p) => eprintln!("Invalid path: {}", p.display()),
///         WatchError::Io(e) => eprintln!("I/O error: {e}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize or operate the notify watcher.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The watch root does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// The filter pattern is not a valid file-name glob.
    #[error("invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The event channel was closed unexpectedly.
    ///
    /// The OS notification thread and the watcher task are no longer
    /// connected.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,

    /// A path is not valid UTF-8.
    ///
    /// Events carrying such a path are logged and skipped.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Creates a new [`WatchError::InvalidPattern`] error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Returns the file path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::PathNotFound(path) => Some(path),
            Self::Notify(_)
            | Self::InvalidPattern { .. }
            | Self::ChannelClosed
            | Self::NonUtf8Path(_)
            | Self::Io(_) => None,
        }
    }
}

/// Errors that can occur while mirroring one changed file.
///
/// Both variants are caught by the event router, written to the action log
/// and discarded. There is no retry.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// No destination can be derived for the source path.
    #[error("invalid source path '{path}': {reason}")]
    InvalidPath {
        /// The source path.
        path: Utf8PathBuf,
        /// Why no destination could be derived.
        reason: &'static str,
    },

    /// Creating the destination directory or copying the bytes failed.
    #[error("failed to copy {source_path} to {destination}: {source}")]
    CopyFailed {
        /// The file being mirrored.
        source_path: Utf8PathBuf,
        /// Where it was being copied to.
        destination: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl MirrorError {
    /// Creates a new [`MirrorError::InvalidPath`] error.
    pub fn invalid_path(path: &Utf8Path, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.to_path_buf(),
            reason,
        }
    }

    /// Creates a new [`MirrorError::CopyFailed`] error.
    pub fn copy_failed(source_path: &Utf8Path, destination: &Utf8Path, source: std::io::Error) -> Self {
        Self::CopyFailed {
            source_path: source_path.to_path_buf(),
            destination: destination.to_path_buf(),
            source,
        }
    }

    /// Returns the source path the failed event referred to.
    #[must_use]
    pub fn source_path(&self) -> &Utf8Path {
        match self {
            Self::InvalidPath { path, .. } => path,
            Self::CopyFailed { source_path, .. } => source_path,
        }
    }
}
