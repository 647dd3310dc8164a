//! One filter-scoped recursive watch, bridged to the async runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    OS notification thread (notify)              │
//! │  ┌───────────────────┐                                          │
//! │  │ RecommendedWatcher │ ── raw notify::Event ──┐                │
//! │  └───────────────────┘                         │                │
//! └────────────────────────────────────────────────│────────────────┘
//!                                    blocking_send │
//!                                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async runtime (tokio)                        │
//! │  FilterWatcher::run ── select! { cancelled, recv, rename wait } │
//! │          │                                                      │
//! │          ▼                                                      │
//! │  EventTranslator (pairing, filter) ──► spawn_blocking(handle)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each event is awaited before the next one is received, so one watcher
//! never handles two events at once.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use smallvec::{smallvec, SmallVec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sm_core::WatchConfig;

use crate::action_log;
use crate::error::WatchError;
use crate::events::{ChangeEvent, EventTranslator};
use crate::filter::GlobFilter;
use crate::router::{EventRouter, RouteOutcome};

/// How long a rename's `From` half waits for its `To` before the file is
/// reported as deleted.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(150);

type RawEvent = notify::Result<notify::Event>;

/// Counters reported by a watcher once it has stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatcherSummary {
    /// The filter pattern the watcher was scoped to.
    pub pattern: String,

    /// Events taken off the channel and handled.
    pub events_handled: u64,

    /// Files successfully mirrored.
    pub files_copied: u64,

    /// Copies abandoned, plus events whose handling aborted.
    pub failures: u64,

    /// Raw notifications still queued when the watcher was cancelled.
    pub notifications_discarded: u64,
}

impl WatcherSummary {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_owned(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: &RouteOutcome) {
        self.events_handled += 1;
        match outcome {
            RouteOutcome::Copied(_) => self.files_copied += 1,
            RouteOutcome::Failed(_) => self.failures += 1,
            RouteOutcome::Logged => {}
        }
    }
}

/// An established subscription for one filter pattern.
///
/// # Lifecycle
///
/// 1. **Subscription**: [`FilterWatcher::subscribe`] validates the pattern
///    and root and starts the OS watch. From then on raw notifications queue
///    up in the channel.
///
/// 2. **Running**: [`FilterWatcher::run`] translates the queued
///    notifications and hands the resulting events to the [`EventRouter`]
///    until the cancellation token fires.
///
/// 3. **Release**: when `run` returns, the OS subscription has been dropped.
///    Dropping a watcher that never ran releases it the same way.
pub struct FilterWatcher {
    pattern: String,
    root: Utf8PathBuf,
    watcher: Option<RecommendedWatcher>,
    translator: EventTranslator<GlobFilter>,
    raw_rx: mpsc::Receiver<RawEvent>,
}

impl std::fmt::Debug for FilterWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterWatcher")
            .field("pattern", &self.pattern)
            .field("root", &self.root)
            .field("is_subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

impl FilterWatcher {
    /// Starts a recursive watch of `config.watch_root` for `pattern`.
    ///
    /// When `config.out_root` lies strictly inside the watch root, events
    /// under it are ignored so that mirrored copies do not feed back. An
    /// output root that contains or equals the watch root excludes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PathNotFound`] if the root doesn't exist,
    /// [`WatchError::InvalidPattern`] for a bad pattern, and
    /// [`WatchError::Notify`] if the OS watch cannot be established.
    pub fn subscribe(config: &WatchConfig, pattern: &str) -> Result<Self, WatchError> {
        let filter = GlobFilter::new(pattern)?;
        let pattern = filter.as_str().to_owned();

        if !config.watch_root.exists() {
            return Err(WatchError::path_not_found(&config.watch_root));
        }
        let root = config.watch_root.canonicalize_utf8()?;

        let mut translator = EventTranslator::new(filter);
        if let Some(excluded) = feedback_dir(&root, &config.out_root) {
            tracing::debug!(path = %excluded, "Ignoring events under the output root");
            translator = translator.excluding(excluded);
        }

        let (raw_tx, raw_rx) = mpsc::channel(config.event_capacity.max(1));

        let mut watcher = notify::recommended_watcher(move |res: RawEvent| {
            // Blocks the notify thread while the channel is full.
            if raw_tx.blocking_send(res).is_err() {
                tracing::debug!("Event channel closed, dropping notification");
            }
        })?;

        watcher.watch(root.as_std_path(), RecursiveMode::Recursive)?;

        tracing::info!(path = %root, pattern = %pattern, "Filter watcher started");

        Ok(Self {
            pattern,
            root,
            watcher: Some(watcher),
            translator,
            raw_rx,
        })
    }

    /// The filter pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The canonical watch root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns `true` while the OS subscription is held.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.watcher.is_some()
    }

    /// Handles events until `token` is cancelled, then releases the
    /// subscription.
    ///
    /// An event already being handled when cancellation arrives is finished
    /// first, and a rename half still waiting for its partner is reported as
    /// a deletion. Notifications still queued are discarded and counted.
    pub async fn run(mut self, router: Arc<EventRouter>, token: CancellationToken) -> WatcherSummary {
        let mut summary = WatcherSummary::new(&self.pattern);

        loop {
            let awaiting_rename = self.translator.has_pending();

            let events: SmallVec<[ChangeEvent; 2]> = tokio::select! {
                biased;

                () = token.cancelled() => break,

                raw = self.raw_rx.recv() => match raw {
                    Some(Ok(event)) => self.translator.translate(event),
                    Some(Err(error)) => {
                        tracing::warn!(pattern = %self.pattern, error = %error, "Notify error");
                        smallvec![self.translator.translate_error(&error)]
                    }
                    None => {
                        let error = WatchError::ChannelClosed;
                        tracing::warn!(pattern = %self.pattern, error = %error, "Stopping watcher");
                        let mut closing = self.translator.flush();
                        closing.push(ChangeEvent::error(error.to_string()));
                        dispatch_all(&router, &self.pattern, closing, &mut summary).await;
                        break;
                    }
                },

                () = tokio::time::sleep(RENAME_PAIR_WINDOW), if awaiting_rename => self.translator.flush(),
            };

            dispatch_all(&router, &self.pattern, events, &mut summary).await;
        }

        let leftover = self.translator.flush();
        dispatch_all(&router, &self.pattern, leftover, &mut summary).await;

        summary.notifications_discarded = self.release();
        if summary.notifications_discarded > 0 {
            tracing::debug!(
                pattern = %self.pattern,
                discarded = summary.notifications_discarded,
                "Discarded queued notifications"
            );
        }

        tracing::info!(
            path = %self.root,
            pattern = %self.pattern,
            events = summary.events_handled,
            "Filter watcher stopped"
        );

        summary
    }

    /// Drops the OS subscription and returns how many notifications were
    /// still queued.
    fn release(&mut self) -> u64 {
        self.raw_rx.close();
        let mut discarded = 0;
        while self.raw_rx.try_recv().is_ok() {
            discarded += 1;
        }
        self.watcher = None;
        discarded
    }
}

/// The output root to ignore, if it lies strictly inside `root`.
fn feedback_dir(root: &Utf8Path, out_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let out = out_root
        .canonicalize_utf8()
        .unwrap_or_else(|_| out_root.to_path_buf());
    (out != root && out.starts_with(root)).then_some(out)
}

async fn dispatch_all(
    router: &Arc<EventRouter>,
    pattern: &str,
    events: SmallVec<[ChangeEvent; 2]>,
    summary: &mut WatcherSummary,
) {
    for event in events {
        let task_router = Arc::clone(router);
        let handled = tokio::task::spawn_blocking(move || task_router.handle(&event)).await;

        match handled {
            Ok(outcome) => summary.record(&outcome),
            Err(join_error) => {
                summary.events_handled += 1;
                summary.failures += 1;
                tracing::error!(pattern, error = %join_error, "Event handler aborted");
                router
                    .logger()
                    .log(&action_log::handler_failed(pattern, &join_error));
            }
        }
    }
}
