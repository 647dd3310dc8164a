//! Fan-out of one watcher per filter pattern, under one cancellation token.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sm_core::WatchConfig;
//! use sm_watcher::{ConsoleLogger, WatchSupervisor};
//!
//! # async fn example() {
//! let config = Arc::new(WatchConfig::new("/src", "/mirror", ["*.cs", "*.vb"]));
//! let handle = WatchSupervisor::start_all(config, Arc::new(ConsoleLogger::new()));
//!
//! // ... later, from anywhere holding the handle or its token ...
//! let summaries = handle.shutdown().await;
//! assert_eq!(summaries.len(), 2);
//! # }
//! ```

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use sm_core::WatchConfig;

use crate::action_log::{self, ActionLogger};
use crate::router::EventRouter;
use crate::watcher::{FilterWatcher, WatcherSummary};

/// Starts and stops the filter watchers of one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchSupervisor;

impl WatchSupervisor {
    /// Subscribes one watcher per distinct filter pattern and starts them.
    ///
    /// Subscription happens before this returns: every pattern is either
    /// being observed or has been logged as abandoned. A pattern that cannot
    /// be subscribed never affects the others.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_all(config: Arc<WatchConfig>, logger: Arc<dyn ActionLogger>) -> SupervisorHandle {
        Self::start_with_token(config, logger, CancellationToken::new())
    }

    /// Like [`WatchSupervisor::start_all`], stopping when `token` is cancelled.
    pub fn start_with_token(
        config: Arc<WatchConfig>,
        logger: Arc<dyn ActionLogger>,
        token: CancellationToken,
    ) -> SupervisorHandle {
        let router = Arc::new(EventRouter::new(config.out_root.clone(), Arc::clone(&logger)));
        let mut tasks = JoinSet::new();
        let mut patterns = Vec::new();
        let mut failed_patterns = Vec::new();

        for pattern in config.distinct_filters() {
            match FilterWatcher::subscribe(&config, pattern) {
                Ok(watcher) => {
                    logger.log(&action_log::watching(watcher.root(), pattern));
                    tasks.spawn(watcher.run(Arc::clone(&router), token.child_token()));
                    patterns.push(pattern.to_owned());
                }
                Err(error) => {
                    tracing::warn!(pattern, error = %error, path = ?error.path(), "Abandoning filter watcher");
                    logger.log(&action_log::subscription_failed(pattern, &error));
                    failed_patterns.push(pattern.to_owned());
                }
            }
        }

        tracing::info!(
            watching = patterns.len(),
            failed = failed_patterns.len(),
            root = %config.watch_root,
            out = %config.out_root,
            "Watch supervisor started"
        );

        SupervisorHandle {
            token,
            tasks,
            patterns,
            failed_patterns,
        }
    }

    /// Watches until `token` is cancelled, then waits for every watcher to
    /// release its subscription.
    pub async fn run(
        config: Arc<WatchConfig>,
        logger: Arc<dyn ActionLogger>,
        token: CancellationToken,
    ) -> Vec<WatcherSummary> {
        let handle = Self::start_with_token(config, logger, token.clone());
        token.cancelled().await;
        handle.wait().await
    }
}

/// Control over a running set of filter watchers.
#[derive(Debug)]
pub struct SupervisorHandle {
    token: CancellationToken,
    tasks: JoinSet<WatcherSummary>,
    patterns: Vec<String>,
    failed_patterns: Vec<String>,
}

impl SupervisorHandle {
    /// Patterns with an established watcher, in configuration order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Patterns whose watcher could not be established.
    #[must_use]
    pub fn failed_patterns(&self) -> &[String] {
        &self.failed_patterns
    }

    /// Returns `true` if at least one watcher is running or was started.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token that stops every watcher. Clones of it can be handed to
    /// signal handlers.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests every watcher to stop. Calling it again has no effect.
    pub fn cancel_all(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Cancelling all filter watchers");
        }
        self.token.cancel();
    }

    /// Waits until every watcher has stopped and released its subscription.
    ///
    /// Does not request cancellation itself.
    pub async fn wait(mut self) -> Vec<WatcherSummary> {
        let mut summaries = Vec::with_capacity(self.patterns.len());

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(summary) => summaries.push(summary),
                Err(error) => tracing::error!(error = %error, "Filter watcher task failed"),
            }
        }

        summaries
    }

    /// Cancels every watcher and waits for them to stop.
    pub async fn shutdown(self) -> Vec<WatcherSummary> {
        self.cancel_all();
        self.wait().await
    }
}
