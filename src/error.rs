//! Error taxonomy for the rotation engine.
//!
//! Construction problems fail fast (`ConfigError`, `BuildError`); everything
//! that happens after the worker is running is reported through the event
//! stream as a [`RollError`] and via the `log` facade, never by panicking.
//! Rotation must not itself cause log loss, so any failure that can be
//! deferred to the next boundary is deferred.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

/// Invalid options detected while building a sink.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file option resolved to an empty path.
    #[error("no file name provided")]
    EmptyFile,
    /// The base path contains characters that cannot appear in a file name.
    #[error("invalid characters in file name '{path}'")]
    InvalidFileName { path: String },
    /// Retention was requested with a zero count.
    #[error("retention count must be greater than zero")]
    ZeroRetentionCount,
    /// An every-N-milliseconds frequency of zero.
    #[error("rotation frequency must be greater than zero")]
    ZeroFrequency,
    /// The command queue cannot be empty.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
    /// Flushing every zero records is meaningless.
    #[error("flush_record_interval must be greater than zero")]
    ZeroFlushInterval,
    /// A timeout overflow policy with a zero duration.
    #[error("overflow timeout must be greater than zero")]
    ZeroOverflowTimeout,
}

/// Everything [`build`](crate::RollingSinkBuilder::build) can fail with.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `mkdir` was requested and the parent directory could not be created.
    #[error("failed to create log directory '{path}': {source}")]
    Mkdir { path: PathBuf, source: io::Error },
    /// The initial log file could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },
}

/// Why a record could not be enqueued.
///
/// Which variant is possible depends on the configured
/// [`OverflowPolicy`](crate::OverflowPolicy): `Drop` yields `QueueFull`,
/// `Timeout` yields `Timeout`, and any policy yields `Closed` once the sink
/// has shut down.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("sink is closed")]
    Closed,
    #[error("record queue is full")]
    QueueFull,
    #[error("timed out after {0:?} waiting for queue space")]
    Timeout(Duration),
}

/// Runtime failures surfaced through the event stream.
#[derive(Debug, Error)]
pub enum RollError {
    #[error("failed to write to '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to flush log file: {source}")]
    Flush { source: io::Error },
    #[error("failed to reopen '{path}': {source}")]
    Reopen { path: PathBuf, source: io::Error },
    #[error("failed to remove old log file '{path}': {source}")]
    Unlink { path: PathBuf, source: io::Error },
    #[error("failed to scan log directory '{dir}': {source}")]
    Scan { dir: PathBuf, source: io::Error },
}
