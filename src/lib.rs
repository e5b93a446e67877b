//! Rotating file sink for newline-delimited log records.
//!
//! A [`RollingFileSink`] accepts opaque byte records (already-formatted log
//! lines) and appends them to an active file that is transparently rotated
//! whenever a clock boundary or a size threshold is crossed. Rotated files
//! are named `{base}[.{date}].{number}[.{ext}]`; on restart the sink scans
//! the directory and resumes the existing series, continuing inside the last
//! file when it is still under the size limit. Retention bounds how many
//! rotated files stay on disk, and an optional `current.log` symlink always
//! names the active file.
//!
//! Records travel over a bounded queue to a worker thread that owns the file
//! and performs every rotation, so producers never block on the filesystem
//! (the [`OverflowPolicy`] decides what happens when the queue fills).
//!
//! ```ignore
//! use rollsink::{Frequency, RetentionLimit, RollingSinkBuilder};
//!
//! let sink = RollingSinkBuilder::new("logs/app")
//!     .with_frequency(Frequency::Daily)
//!     .with_date_format("yyyy-MM-dd".parse()?)
//!     .with_size("50m".parse()?)
//!     .with_retention(RetentionLimit::new(7))
//!     .with_symlink(true)
//!     .with_mkdir(true)
//!     .build()?;
//!
//! sink.write(b"{\"level\":30,\"msg\":\"hello\"}\n")?;
//! ```
//!
//! Flushing is best-effort durable: the worker flushes at every rotation
//! boundary and on the configured record interval, but a record in transit
//! during a crash may be lost. Rotation never takes the sink down; flush,
//! reopen, unlink, and scan failures are reported through
//! [`events`](RollingFileSink::events) and retried at the next boundary.

mod builder;
mod error;
mod events;
mod filename;
mod frequency;
mod pattern;
mod retention;
mod scan;
mod sink;
mod size;
mod symlink;

pub use builder::{FileSpec, RollingSinkBuilder};
pub use error::{BuildError, ConfigError, RollError, WriteError};
pub use events::RollEvent;
pub use frequency::{Frequency, ParseFrequencyError};
pub use pattern::{DatePattern, ParseDatePatternError};
pub use retention::RetentionLimit;
pub use sink::{OverflowPolicy, RollingFileSink, DEFAULT_CHANNEL_CAPACITY};
pub use size::{ParseSizeError, SizeLimit};
