//! Error types for the sm-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related errors.
//! Every variant is fatal to startup: the process reports it and never begins
//! watching.

use camino::Utf8PathBuf;

/// Errors that can occur while resolving and validating a [`WatchConfig`].
///
/// [`WatchConfig`]: crate::WatchConfig
///
/// # Examples
///
/// ```
/// use sm_core::ConfigError;
/// use camino::Utf8PathBuf;
///
/// let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/some/path"));
/// assert!(error.to_string().contains("/some/path"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A required directory does not exist.
    #[error("missing required directory: {0}")]
    MissingDirectory(Utf8PathBuf),

    /// A path that must be a directory points at something else.
    #[error("not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// No default could be determined for a setting that was not supplied.
    #[error("no default available for {0}")]
    NoDefault(&'static str),

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// The output directory was missing and could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDirectory {
        /// The directory that could not be created.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while reading configuration or inspecting a path.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidPath`] error.
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("/invalid/path", "path is empty");
        let msg = error.to_string();
        assert!(msg.contains("/invalid/path"));
        assert!(msg.contains("path is empty"));
    }

    #[test]
    fn test_missing_directory_display() {
        let error = ConfigError::MissingDirectory(Utf8PathBuf::from("/missing/dir"));
        assert_eq!(error.to_string(), "missing required directory: /missing/dir");
    }

    #[test]
    fn test_not_a_directory_display() {
        let error = ConfigError::NotADirectory(Utf8PathBuf::from("/etc/hosts"));
        assert_eq!(error.to_string(), "not a directory: /etc/hosts");
    }

    #[test]
    fn test_create_directory_keeps_source() {
        let error = ConfigError::CreateDirectory {
            path: Utf8PathBuf::from("/readonly/out"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("/readonly/out"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::InvalidOption {
            option: "event_capacity".to_owned(),
            reason: "must be positive".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("event_capacity"));
        assert!(msg.contains("must be positive"));
    }
}
