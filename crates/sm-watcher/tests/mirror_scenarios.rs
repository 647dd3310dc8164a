//! End-to-end scenarios against the real filesystem notification backend.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use sm_core::WatchConfig;
use sm_watcher::{ActionLogger, MemoryLogger, SupervisorHandle, WatchSupervisor};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(25);
const SETTLE: Duration = Duration::from_millis(300);

struct Scenario {
    _dirs: Vec<TempDir>,
    root: Utf8PathBuf,
    out: Utf8PathBuf,
    logger: Arc<MemoryLogger>,
}

fn canonical_temp_dir() -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().canonicalize().expect("canonical"))
        .expect("UTF-8");
    (dir, path)
}

impl Scenario {
    /// Watch root and output root in unrelated directories.
    fn new() -> Self {
        let (src, root) = canonical_temp_dir();
        let (out, out_root) = canonical_temp_dir();
        Self::with_roots(vec![src, out], root, out_root)
    }

    /// The watch root is a folder inside the output root.
    fn watch_inside_out() -> Self {
        let (base, out_root) = canonical_temp_dir();
        let root = out_root.join("projects");
        fs::create_dir_all(&root).expect("mkdir");
        Self::with_roots(vec![base], root, out_root)
    }

    /// Output root and watch root are the same directory.
    fn shared_root() -> Self {
        let (base, root) = canonical_temp_dir();
        Self::with_roots(vec![base], root.clone(), root)
    }

    fn with_roots(dirs: Vec<TempDir>, root: Utf8PathBuf, out: Utf8PathBuf) -> Self {
        Self {
            _dirs: dirs,
            root,
            out,
            logger: Arc::new(MemoryLogger::new()),
        }
    }

    fn mkdir(&self, dir: &str) -> Utf8PathBuf {
        let path = self.root.join(dir);
        fs::create_dir_all(&path).expect("mkdir");
        path
    }

    fn start(&self, filters: &[&str]) -> SupervisorHandle {
        self.start_into(&self.out, filters)
    }

    fn start_into(&self, out: &Utf8Path, filters: &[&str]) -> SupervisorHandle {
        let config = Arc::new(WatchConfig::new(
            self.root.clone(),
            out.to_path_buf(),
            filters.iter().copied(),
        ));
        let logger = Arc::clone(&self.logger) as Arc<dyn ActionLogger>;
        WatchSupervisor::start_all(config, logger)
    }
}

async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(POLL).await;
    }
    check()
}

fn has_content(path: &Utf8Path, expected: &str) -> bool {
    fs::read_to_string(path).is_ok_and(|content| content == expected)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_changed_file_is_mirrored_with_new_content() {
    let scenario = Scenario::new();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "class X { }").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::write(&source, "class X { int y; }").expect("rewrite");

    let mirrored = scenario.out.join("a").join("x.cs");
    assert!(eventually(|| has_content(&mirrored, "class X { int y; }")).await);
    assert!(scenario.logger.contains(&format!("File {source} was changed")));
    assert!(scenario.logger.contains(&format!("Copying {source} to {mirrored}")));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_created_then_written_file_is_mirrored_and_others_are_not() {
    let scenario = Scenario::new();
    let dir = scenario.mkdir("b");

    let handle = scenario.start(&["*.cs", "*.vb"]);
    assert_eq!(handle.patterns(), ["*.cs", "*.vb"]);

    fs::write(dir.join("y.vb"), "Module Y\nEnd Module").expect("write");
    fs::write(dir.join("z.txt"), "not source").expect("write");

    let mirrored = scenario.out.join("b").join("y.vb");
    assert!(eventually(|| has_content(&mirrored, "Module Y\nEnd Module")).await);

    tokio::time::sleep(SETTLE).await;
    assert!(!scenario.out.join("b").join("z.txt").exists());
    assert!(!scenario.logger.contains("z.txt"));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_nested_file_is_flattened_to_parent_name() {
    let scenario = Scenario::new();
    let source = scenario.mkdir("sub/dir").join("file.cs");
    fs::write(&source, "v1").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::write(&source, "v2").expect("rewrite");

    assert!(eventually(|| has_content(&scenario.out.join("dir").join("file.cs"), "v2")).await);
    assert!(!scenario.out.join("sub").exists());

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_is_not_propagated() {
    let scenario = Scenario::new();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "v1").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::write(&source, "v2").expect("rewrite");
    let mirrored = scenario.out.join("a").join("x.cs");
    assert!(eventually(|| has_content(&mirrored, "v2")).await);

    fs::remove_file(&source).expect("remove");
    assert!(eventually(|| scenario.logger.contains(&format!("File {source} was deleted"))).await);
    assert!(has_content(&mirrored, "v2"));

    handle.shutdown().await;
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rename_is_logged_once_without_copy() {
    let scenario = Scenario::new();
    let dir = scenario.mkdir("a");
    let old = dir.join("old.cs");
    let new = dir.join("new.cs");
    fs::write(&old, "renamed").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::rename(&old, &new).expect("rename");

    let line = format!("File {old} was renamed to {new}");
    assert!(eventually(|| scenario.logger.contains(&line)).await);

    tokio::time::sleep(SETTLE).await;
    let renames = scenario
        .logger
        .lines()
        .iter()
        .filter(|l| l.contains("was renamed"))
        .count();
    assert_eq!(renames, 1);
    assert!(!scenario.out.join("a").exists());

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_root_inside_watch_root_does_not_feed_back() {
    let scenario = Scenario::new();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "v1").expect("write");
    let inner_out = scenario.mkdir("mirror");

    let handle = scenario.start_into(&inner_out, &["*.cs"]);
    fs::write(&source, "v2").expect("rewrite");

    let mirrored = inner_out.join("a").join("x.cs");
    assert!(eventually(|| has_content(&mirrored, "v2")).await);

    tokio::time::sleep(SETTLE).await;
    assert!(!scenario.logger.contains(&format!("File {mirrored}")));
    assert!(!scenario.logger.contains("Failed to mirror"));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_mirroring_after_shutdown() {
    let scenario = Scenario::new();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "v1").expect("write");

    let handle = scenario.start(&["*.cs"]);
    let summaries = tokio::time::timeout(TIMEOUT, handle.shutdown())
        .await
        .expect("shutdown completes");
    assert_eq!(summaries.len(), 1);

    fs::write(&source, "v2").expect("rewrite");
    tokio::time::sleep(SETTLE).await;
    assert!(!scenario.out.join("a").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_root_inside_out_root_is_mirrored() {
    let scenario = Scenario::watch_inside_out();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "v1").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::write(&source, "v2").expect("rewrite");

    let mirrored = scenario.out.join("a").join("x.cs");
    assert!(eventually(|| has_content(&mirrored, "v2")).await);
    assert!(scenario.logger.contains(&format!("File {source} was changed")));
    assert!(scenario.logger.contains(&format!("Copying {source} to {mirrored}")));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_root_equal_to_watch_root_keeps_logging() {
    let scenario = Scenario::shared_root();
    let top = scenario.mkdir("a").join("x.cs");
    let nested = scenario.mkdir("sub/b").join("y.cs");
    fs::write(&top, "v1").expect("write");
    fs::write(&nested, "n1").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::write(&top, "v2").expect("rewrite");
    fs::write(&nested, "n2").expect("rewrite");

    assert!(eventually(|| scenario.logger.contains(&format!("File {top} was changed"))).await);
    let flattened = scenario.root.join("b").join("y.cs");
    assert!(eventually(|| has_content(&flattened, "n2")).await);

    tokio::time::sleep(SETTLE).await;
    assert!(has_content(&top, "v2"));
    assert!(!scenario.logger.contains("Failed to mirror"));

    handle.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_move_out_of_tree_is_logged_as_deleted() {
    let scenario = Scenario::new();
    let (_elsewhere_dir, elsewhere) = canonical_temp_dir();
    let source = scenario.mkdir("a").join("x.cs");
    fs::write(&source, "leaving").expect("write");

    let handle = scenario.start(&["*.cs"]);
    fs::rename(&source, elsewhere.join("x.cs")).expect("move out");

    let line = format!("File {source} was deleted");
    assert!(eventually(|| scenario.logger.contains(&line)).await);
    assert!(!scenario.out.join("a").exists());

    handle.shutdown().await;
}

#[cfg(target_os = "linux")]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_move_into_tree_is_logged_as_created() {
    let scenario = Scenario::new();
    let (_elsewhere_dir, elsewhere) = canonical_temp_dir();
    let outside = elsewhere.join("x.cs");
    fs::write(&outside, "arriving").expect("write");
    let arrived = scenario.mkdir("a").join("x.cs");

    let handle = scenario.start(&["*.cs"]);
    fs::rename(&outside, &arrived).expect("move in");

    let line = format!("File {arrived} was created");
    assert!(eventually(|| scenario.logger.contains(&line)).await);

    tokio::time::sleep(SETTLE).await;
    assert!(!scenario.out.join("a").exists());

    handle.shutdown().await;
}
