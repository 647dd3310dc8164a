//! Filter-scoped file watchers that mirror changed files into an output tree.
//!
//! # Overview
//!
//! The sm-watcher crate is designed to:
//!
//! - Run one independent recursive watch per file-name pattern (`*.cs`, `*.vb`, ...)
//! - Classify each notification as created, changed, renamed, deleted or error
//! - Copy every changed file to `<out root>/<parent dir name>/<file name>`
//! - Keep going when a single event fails, and stop every watcher on one token
//!
//! # Architecture
//!
//! ```text
//!                         WatchSupervisor
//!                 (one CancellationToken, JoinSet)
//!                 ┌──────────┼──────────┐
//!                 ▼          ▼          ▼
//!          FilterWatcher FilterWatcher FilterWatcher
//!             (*.vb)       (*.cs)       (*.dll)
//!                 └──────────┼──────────┘
//!                            ▼
//!                       EventRouter ──► ActionLogger
//!                            │
//!                   Changed  ▼
//!                  CopyTask::resolve ──► copy_file
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! sm-cli ──► sm-watcher ──► sm-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sm_core::{ConfigInput, WatchConfig};
//! use sm_watcher::{ConsoleLogger, WatchSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(WatchConfig::resolve(ConfigInput::default())?);
//!     let handle = WatchSupervisor::start_all(config, Arc::new(ConsoleLogger::new()));
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Nothing in here terminates the process. See [`WatchError`] for what
//! abandons a single watcher and [`MirrorError`] for what abandons a single
//! copy.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod action_log;
pub mod error;
pub mod events;
pub mod filter;
pub mod mirror;
pub mod router;
pub mod supervisor;
pub mod watcher;

pub use action_log::{ActionLogger, ConsoleLogger, MemoryLogger};
pub use error::{MirrorError, WatchError};
pub use events::{ChangeEvent, ChangeKind, EventTranslator};
pub use filter::{FileFilter, GlobFilter};
pub use mirror::{copy_file, resolve_destination, CopyTask};
pub use router::{EventRouter, RouteOutcome};
pub use supervisor::{SupervisorHandle, WatchSupervisor};
pub use watcher::{FilterWatcher, WatcherSummary};
