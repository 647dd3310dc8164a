//! Configuration structures for the srcmirror tool.
//!
//! - [`WatchConfig`] - the resolved, validated configuration handed to the
//!   watch engine. Immutable for the lifetime of a run.
//! - [`ConfigInput`] - what the user actually supplied (command line, config
//!   file, environment). Every field is optional.
//!
//! [`WatchConfig::resolve`] turns the latter into the former, filling in the
//! defaults and checking that both directories are usable.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ConfigError;

/// Filter patterns used when none are supplied.
pub const DEFAULT_FILTERS: [&str; 3] = ["*.vb", "*.cs", "*.dll"];

/// Default capacity of each watcher's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Sub-path of the platform data directory used as the default output root.
const DEFAULT_OUT_SUBDIR: [&str; 2] = ["srcmirror", "CopiedSourceFiles"];

/// Resolved configuration for one watch-and-mirror run.
///
/// # Examples
///
/// ```
/// use sm_core::WatchConfig;
///
/// let config = WatchConfig::new("/src", "/mirror", ["*.cs", "*.vb", "*.cs"]);
/// assert_eq!(config.distinct_filters(), vec!["*.cs", "*.vb"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory tree being monitored, including all subdirectories.
    pub watch_root: Utf8PathBuf,

    /// Directory receiving the mirrored copies.
    pub out_root: Utf8PathBuf,

    /// File-name glob patterns, one watcher each (e.g. `*.cs`).
    pub filters: SmallVec<[String; 4]>,

    /// Capacity of the channel between the OS notification thread and a
    /// watcher's event loop.
    pub event_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_root: Utf8PathBuf::new(),
            out_root: Utf8PathBuf::new(),
            filters: DEFAULT_FILTERS.iter().map(|f| (*f).to_owned()).collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl WatchConfig {
    /// Creates a configuration from already-resolved parts.
    ///
    /// No validation happens here; use [`WatchConfig::resolve`] for input
    /// that comes from the user. An empty filter list falls back to
    /// [`DEFAULT_FILTERS`].
    pub fn new<I, S>(
        watch_root: impl Into<Utf8PathBuf>,
        out_root: impl Into<Utf8PathBuf>,
        filters: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self {
            watch_root: watch_root.into(),
            out_root: out_root.into(),
            filters: filters.into_iter().map(Into::into).collect(),
            ..Self::default()
        };
        if config.filters.is_empty() {
            config.filters = Self::default().filters;
        }
        config
    }

    /// Sets the per-watcher event channel capacity.
    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Returns the filter patterns with exact duplicates removed.
    ///
    /// Order of first appearance is kept. Patterns that merely overlap
    /// (`*.cs` and `*.c?`) are distinct and both survive.
    #[must_use]
    pub fn distinct_filters(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        self.filters
            .iter()
            .map(String::as_str)
            .filter(|pattern| seen.insert(*pattern))
            .collect()
    }

    /// Resolves user input into a validated configuration.
    ///
    /// - The watch root defaults to the directory containing the running
    ///   executable and must be an existing directory.
    /// - The output root defaults to `<data dir>/srcmirror/CopiedSourceFiles`
    ///   and is created if it does not exist yet.
    /// - Filters default to [`DEFAULT_FILTERS`]. Blank patterns are dropped.
    ///
    /// Both roots are canonicalized, so the result always holds absolute paths.
    pub fn resolve(input: ConfigInput) -> Result<Self, ConfigError> {
        let watch_root = match input.watch_root {
            Some(path) => path,
            None => default_watch_root()?,
        };
        let watch_root = existing_directory(&watch_root)?;

        let out_root = match input.out_root {
            Some(path) => path,
            None => default_out_root()?,
        };
        let out_root = ensure_directory(&out_root)?;

        let event_capacity = match input.event_capacity {
            Some(0) => {
                return Err(ConfigError::InvalidOption {
                    option: "event_capacity".to_owned(),
                    reason: "must be positive".to_owned(),
                });
            }
            Some(capacity) => capacity,
            None => DEFAULT_EVENT_CAPACITY,
        };

        let filters = input
            .filters
            .iter()
            .map(|pattern| pattern.trim())
            .filter(|pattern| !pattern.is_empty())
            .map(str::to_owned);

        Ok(Self::new(watch_root, out_root, filters).with_event_capacity(event_capacity))
    }
}

/// User-supplied configuration, before defaults and validation.
///
/// Loaded from an optional JSON file and then overridden field by field from
/// the command line with [`ConfigInput::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigInput {
    /// Directory to watch.
    pub watch_root: Option<Utf8PathBuf>,

    /// Directory to mirror into.
    pub out_root: Option<Utf8PathBuf>,

    /// Filter patterns.
    pub filters: Vec<String>,

    /// Per-watcher event channel capacity.
    pub event_capacity: Option<usize>,
}

impl ConfigInput {
    /// Reads a JSON configuration file.
    pub fn from_json_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parses a JSON configuration document.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Overlays `overrides` on top of `self`.
    ///
    /// Set options in `overrides` win; a non-empty filter list replaces the
    /// base list entirely.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            watch_root: overrides.watch_root.or(self.watch_root),
            out_root: overrides.out_root.or(self.out_root),
            filters: if overrides.filters.is_empty() {
                self.filters
            } else {
                overrides.filters
            },
            event_capacity: overrides.event_capacity.or(self.event_capacity),
        }
    }
}

/// Directory containing the running executable.
pub fn default_watch_root() -> Result<Utf8PathBuf, ConfigError> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or(ConfigError::NoDefault("watch directory"))?
        .to_path_buf();
    Utf8PathBuf::from_path_buf(dir).map_err(|dir| {
        ConfigError::invalid_path(&*dir.to_string_lossy(), "path is not valid UTF-8")
    })
}

/// `<platform data dir>/srcmirror/CopiedSourceFiles`.
pub fn default_out_root() -> Result<Utf8PathBuf, ConfigError> {
    let data = dirs::data_dir().ok_or(ConfigError::NoDefault("output directory"))?;
    let mut out = Utf8PathBuf::from_path_buf(data).map_err(|dir| {
        ConfigError::invalid_path(&*dir.to_string_lossy(), "path is not valid UTF-8")
    })?;
    for part in DEFAULT_OUT_SUBDIR {
        out.push(part);
    }
    Ok(out)
}

fn existing_directory(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    if path.as_str().trim().is_empty() {
        return Err(ConfigError::invalid_path(path, "path is empty"));
    }
    let canonical = match path.canonicalize_utf8() {
        Ok(canonical) => canonical,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingDirectory(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::invalid_path(
                path,
                format!("cannot resolve directory: {e}"),
            ));
        }
    };
    if !canonical.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    Ok(canonical)
}

fn ensure_directory(path: &Utf8Path) -> Result<Utf8PathBuf, ConfigError> {
    if path.as_str().trim().is_empty() {
        return Err(ConfigError::invalid_path(path, "path is empty"));
    }
    if !path.exists() {
        fs::create_dir_all(path).map_err(|source| ConfigError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
    }
    existing_directory(path)
}
