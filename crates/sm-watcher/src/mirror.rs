//! Destination layout and file copying.
//!
//! A changed file is mirrored to `<out root>/<parent dir name>/<file name>`:
//! only the name of the file's immediate parent directory survives, so
//! `root/sub/dir/file.cs` lands at `out/dir/file.cs`. Two source directories
//! that share a name share one mirror folder, and same-named files in them
//! overwrite each other. That flattening is intended; nothing deduplicates it.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::MirrorError;

/// One pending copy, derived from a changed file.
///
/// # Examples
///
/// ```
/// use sm_watcher::CopyTask;
/// use camino::Utf8Path;
///
/// let task = CopyTask::resolve(
///     Utf8Path::new("/src/sub/dir/file.cs"),
///     Utf8Path::new("/out"),
/// ).unwrap();
/// assert_eq!(task.destination_dir.as_str(), "/out/dir");
/// assert_eq!(task.destination.as_str(), "/out/dir/file.cs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyTask {
    /// The file that changed.
    pub source: Utf8PathBuf,

    /// Mirror folder, always a direct child of the output root.
    pub destination_dir: Utf8PathBuf,

    /// Full destination path.
    pub destination: Utf8PathBuf,
}

impl CopyTask {
    /// Derives the mirror destination for `source` under `out_root`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::InvalidPath`] when `source` has no file name or
    /// no named parent directory (e.g. `/x.cs`).
    pub fn resolve(source: &Utf8Path, out_root: &Utf8Path) -> Result<Self, MirrorError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| MirrorError::invalid_path(source, "path has no file name"))?;
        let parent_name = source
            .parent()
            .and_then(Utf8Path::file_name)
            .ok_or_else(|| MirrorError::invalid_path(source, "path has no parent directory"))?;

        let destination_dir = out_root.join(parent_name);
        let destination = destination_dir.join(file_name);

        Ok(Self {
            source: source.to_path_buf(),
            destination_dir,
            destination,
        })
    }

    /// Copies the source to the destination. See [`copy_file`].
    pub fn execute(&self) -> Result<u64, MirrorError> {
        copy_file(&self.source, &self.destination)
    }
}

/// Resolves only the destination path of [`CopyTask::resolve`].
pub fn resolve_destination(source: &Utf8Path, out_root: &Utf8Path) -> Result<Utf8PathBuf, MirrorError> {
    CopyTask::resolve(source, out_root).map(|task| task.destination)
}

/// Copies `source` to `destination`, creating missing parent directories and
/// overwriting any existing file. Returns the number of bytes copied.
///
/// Directory creation is idempotent, so concurrent copies into the same
/// mirror folder are safe. Two copies racing for the same destination
/// leave whichever finished last.
///
/// # Errors
///
/// Returns [`MirrorError::CopyFailed`] on any I/O failure (source vanished,
/// permission denied, disk full, ...) and [`MirrorError::InvalidPath`] when
/// source and destination are the same file.
pub fn copy_file(source: &Utf8Path, destination: &Utf8Path) -> Result<u64, MirrorError> {
    if source == destination {
        return Err(MirrorError::invalid_path(
            source,
            "source and destination are the same file",
        ));
    }

    if let Some(dir) = destination.parent() {
        fs::create_dir_all(dir).map_err(|e| MirrorError::copy_failed(source, destination, e))?;
    }

    fs::copy(source, destination).map_err(|e| MirrorError::copy_failed(source, destination, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir is UTF-8")
    }

    #[test]
    fn test_resolve_flattens_to_parent_name() {
        let dest = resolve_destination(
            Utf8Path::new("/root/sub/dir/file.cs"),
            Utf8Path::new("/out"),
        )
        .expect("resolvable");
        assert_eq!(dest.as_str(), "/out/dir/file.cs");
    }

    #[test]
    fn test_resolve_same_parent_names_collide() {
        let out = Utf8Path::new("/out");
        let first = resolve_destination(Utf8Path::new("/root/a/shared/x.cs"), out).expect("ok");
        let second = resolve_destination(Utf8Path::new("/root/b/shared/x.cs"), out).expect("ok");
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_without_parent_name() {
        let err = resolve_destination(Utf8Path::new("/x.cs"), Utf8Path::new("/out"))
            .expect_err("no parent directory name");
        assert!(matches!(err, MirrorError::InvalidPath { .. }));

        let err = resolve_destination(Utf8Path::new("x.cs"), Utf8Path::new("/out"))
            .expect_err("relative path without parent");
        assert!(matches!(err, MirrorError::InvalidPath { .. }));
    }

    #[test]
    fn test_resolve_without_file_name() {
        let err = resolve_destination(Utf8Path::new("/root/a/.."), Utf8Path::new("/out"))
            .expect_err("no file name");
        assert!(matches!(err, MirrorError::InvalidPath { .. }));
    }

    #[test]
    fn test_copy_creates_directory_and_copies_bytes() {
        let src = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let source = utf8(&src).join("a").join("x.cs");
        fs::create_dir_all(source.parent().expect("has parent")).expect("mkdir");
        fs::write(&source, b"class X {}").expect("write");

        let task = CopyTask::resolve(&source, &utf8(&out)).expect("resolvable");
        let copied = task.execute().expect("copy succeeds");

        assert_eq!(copied, 10);
        assert_eq!(task.destination, utf8(&out).join("a").join("x.cs"));
        assert_eq!(fs::read(&task.destination).expect("read"), b"class X {}");
    }

    #[test]
    fn test_copy_twice_is_idempotent() {
        let src = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let source = utf8(&src).join("a").join("x.cs");
        fs::create_dir_all(source.parent().expect("has parent")).expect("mkdir");
        fs::write(&source, b"same content").expect("write");

        let task = CopyTask::resolve(&source, &utf8(&out)).expect("resolvable");
        task.execute().expect("first copy");
        task.execute().expect("second copy");

        assert_eq!(fs::read(&task.destination).expect("read"), b"same content");
        let entries = fs::read_dir(&task.destination_dir).expect("read dir").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_copy_overwrites_existing() {
        let src = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let source = utf8(&src).join("a").join("x.cs");
        fs::create_dir_all(source.parent().expect("has parent")).expect("mkdir");
        fs::write(&source, b"new").expect("write");

        let task = CopyTask::resolve(&source, &utf8(&out)).expect("resolvable");
        fs::create_dir_all(&task.destination_dir).expect("mkdir");
        fs::write(&task.destination, b"old and longer").expect("write");

        task.execute().expect("copy");
        assert_eq!(fs::read(&task.destination).expect("read"), b"new");
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let out = TempDir::new().expect("temp dir");
        let task = CopyTask::resolve(
            Utf8Path::new("/definitely/not/here/srcmirror.cs"),
            &utf8(&out),
        )
        .expect("resolvable");

        let err = task.execute().expect_err("source is missing");
        assert!(matches!(err, MirrorError::CopyFailed { .. }));
    }

    #[test]
    fn test_copy_uncreatable_directory_fails() {
        let src = TempDir::new().expect("temp dir");
        let out = TempDir::new().expect("temp dir");
        let source = utf8(&src).join("a").join("x.cs");
        fs::create_dir_all(source.parent().expect("has parent")).expect("mkdir");
        fs::write(&source, b"x").expect("write");
        // A plain file where the mirror folder should go.
        fs::write(utf8(&out).join("a"), b"blocker").expect("write");

        let err = CopyTask::resolve(&source, &utf8(&out))
            .expect("resolvable")
            .execute()
            .expect_err("directory cannot be created");
        assert!(matches!(err, MirrorError::CopyFailed { .. }));
    }

    #[test]
    fn test_copy_onto_itself_is_rejected() {
        let path = Utf8Path::new("/out/a/x.cs");
        assert!(matches!(
            copy_file(path, path),
            Err(MirrorError::InvalidPath { .. })
        ));
    }
}
