//! File filtering for watch events.
//!
//! Every filter watcher is scoped to one file-name pattern such as `*.cs`.
//! The [`FileFilter`] trait is the predicate applied to each event path, so
//! unrelated files never reach the event router.
//!
//! # Examples
//!
//! ```
//! use sm_watcher::{FileFilter, GlobFilter};
//! use camino::Utf8Path;
//!
//! let filter = GlobFilter::new("*.cs").unwrap();
//!
//! assert!(filter.should_process(Utf8Path::new("/src/app/Program.cs")));
//! assert!(!filter.should_process(Utf8Path::new("/src/app/notes.txt")));
//! ```

use camino::Utf8Path;
use glob::{MatchOptions, Pattern};

use crate::error::WatchError;

/// A filter for determining which file events to process.
///
/// Filters must be [`Send`], [`Sync`] and `'static` because they travel with
/// their watcher into a spawned task.
///
/// # Examples
///
/// ```
/// use sm_watcher::FileFilter;
/// use camino::Utf8Path;
///
/// struct NoTempFiles;
///
/// impl FileFilter for NoTempFiles {
///     fn should_process(&self, path: &Utf8Path) -> bool {
///         path.extension() != Some("tmp")
///     }
/// }
/// ```
pub trait FileFilter: Send + Sync + 'static {
    /// Returns `true` if the file at the given path should be processed.
    fn should_process(&self, path: &Utf8Path) -> bool;
}

/// A glob over the file name of the event path.
///
/// Only the final path component is matched, so `*.cs` accepts
/// `/root/a/b/x.cs` at any depth. Matching is case-insensitive by default
/// (`*.cs` accepts `Form1.CS`).
#[derive(Debug, Clone)]
pub struct GlobFilter {
    pattern: Pattern,
    options: MatchOptions,
}

impl GlobFilter {
    /// Compiles a file-name pattern.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidPattern`] for an empty pattern, a pattern
    /// containing a path separator, or invalid glob syntax.
    pub fn new(pattern: &str) -> Result<Self, WatchError> {
        if pattern.trim().is_empty() {
            return Err(WatchError::invalid_pattern(pattern, "pattern is empty"));
        }
        if pattern.contains(['/', '\\']) {
            return Err(WatchError::invalid_pattern(
                pattern,
                "pattern must match file names, not paths",
            ));
        }

        let compiled = Pattern::new(pattern)
            .map_err(|e| WatchError::invalid_pattern(pattern, e.msg))?;

        Ok(Self {
            pattern: compiled,
            options: MatchOptions {
                case_sensitive: false,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            },
        })
    }

    /// Returns the original pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns `true` if `name` (a bare file name) matches.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.pattern.matches_with(name, self.options)
    }
}

impl FileFilter for GlobFilter {
    fn should_process(&self, path: &Utf8Path) -> bool {
        path.file_name().is_some_and(|name| self.matches_name(name))
    }
}
