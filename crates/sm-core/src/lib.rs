//! Core types and errors for the srcmirror tool.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`WatchConfig`], the immutable description of what to watch and where
//!   to mirror it
//! - [`ConfigInput`], the partially specified input that [`WatchConfig::resolve`]
//!   completes with defaults and validates
//! - [`ConfigError`] for everything that can go wrong before watching starts

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{ConfigInput, DEFAULT_EVENT_CAPACITY, DEFAULT_FILTERS, WatchConfig};
pub use error::ConfigError;
