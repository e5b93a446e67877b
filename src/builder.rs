//! Builder and construction sequence for [`RollingFileSink`].
//!
//! `build` validates every option, resolves the base path, detects the
//! sequence number to resume at, opens (or continues) the active file,
//! points the optional symlink at it, and finally spawns the worker with a
//! fully initialised state.

use std::{
    collections::VecDeque,
    fs,
    io::BufWriter,
    path::{Path, PathBuf},
};

use crate::{
    error::{BuildError, ConfigError},
    events::{event_channel, RollEvent},
    filename::{build_file_name, sanitize_file, validate_file_name},
    frequency::{local_from_ms, Frequency, FrequencySpec},
    pattern::DatePattern,
    retention::RetentionLimit,
    scan::detect_last_number,
    sink::{
        worker::{open_append, spawn_worker, RollState, WorkerConfig},
        OverflowPolicy, RollingFileSink, DEFAULT_CHANNEL_CAPACITY,
    },
    size::SizeLimit,
};

/// The base path, either fixed or computed once at build time.
pub enum FileSpec {
    Path(PathBuf),
    /// Evaluated exactly once, when the sink is built. Rotations keep using
    /// the result; the thunk is never re-invoked.
    Thunk(Box<dyn FnOnce() -> PathBuf + Send>),
}

impl FileSpec {
    fn resolve(self) -> PathBuf {
        match self {
            FileSpec::Path(path) => path,
            FileSpec::Thunk(thunk) => thunk(),
        }
    }
}

/// Fluent configuration for a [`RollingFileSink`].
///
/// ```ignore
/// let sink = RollingSinkBuilder::new("logs/app")
///     .with_size("20m".parse()?)
///     .with_frequency(Frequency::Daily)
///     .with_date_format("yyyy-MM-dd".parse()?)
///     .with_retention(RetentionLimit::new(7))
///     .with_symlink(true)
///     .with_mkdir(true)
///     .build()?;
/// ```
pub struct RollingSinkBuilder {
    file: FileSpec,
    size: Option<SizeLimit>,
    frequency: Option<Frequency>,
    extension: Option<String>,
    date_format: Option<DatePattern>,
    limit: Option<RetentionLimit>,
    symlink: bool,
    mkdir: bool,
    capacity: usize,
    flush_record_interval: usize,
    overflow_policy: OverflowPolicy,
}

impl RollingSinkBuilder {
    /// Target a fixed base path. The extension and the rotation segments are
    /// appended to it; see [`with_extension`](Self::with_extension).
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self::from_spec(FileSpec::Path(file.into()))
    }

    /// Compute the base path with a thunk, evaluated once at build time.
    pub fn from_fn<F>(file: F) -> Self
    where
        F: FnOnce() -> PathBuf + Send + 'static,
    {
        Self::from_spec(FileSpec::Thunk(Box::new(file)))
    }

    fn from_spec(file: FileSpec) -> Self {
        RollingSinkBuilder {
            file,
            size: None,
            frequency: None,
            extension: None,
            date_format: None,
            limit: None,
            symlink: false,
            mkdir: false,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            flush_record_interval: 1,
            overflow_policy: OverflowPolicy::Drop,
        }
    }

    /// Rotate once the active file reaches this many bytes.
    pub fn with_size(mut self, size: SizeLimit) -> Self {
        self.size = Some(size);
        self
    }

    /// Rotate on a clock schedule as well.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Force the file extension instead of inferring it from the base path.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Insert a date segment between base and sequence number. Takes effect
    /// together with [`with_frequency`](Self::with_frequency); the segment
    /// names the period the file belongs to.
    pub fn with_date_format(mut self, pattern: DatePattern) -> Self {
        self.date_format = Some(pattern);
        self
    }

    /// Bound how many rotated files stay on disk.
    pub fn with_retention(mut self, limit: RetentionLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Maintain a `current.log` sibling symlink pointing at the active file.
    pub fn with_symlink(mut self, symlink: bool) -> Self {
        self.symlink = symlink;
        self
    }

    /// Create missing parent directories at build time.
    pub fn with_mkdir(mut self, mkdir: bool) -> Self {
        self.mkdir = mkdir;
        self
    }

    /// Bounded record-queue size. Must be greater than zero.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Flush the file every N records (1 flushes on every record). Rotation
    /// boundaries always flush regardless. Must be greater than zero.
    pub fn with_flush_record_interval(mut self, interval: usize) -> Self {
        self.flush_record_interval = interval;
        self
    }

    /// What `write` does when the record queue is full.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Validate the options, open the initial file (resuming an existing
    /// series where one is found), and start the worker.
    pub fn build(self) -> Result<RollingFileSink, BuildError> {
        self.validate()?;
        let RollingSinkBuilder {
            file,
            size,
            frequency,
            extension,
            date_format,
            limit,
            symlink,
            mkdir,
            capacity,
            flush_record_interval,
            overflow_policy,
        } = self;

        let raw = file.resolve();
        let raw = raw.to_string_lossy().into_owned();
        let (base, extension) = sanitize_file(&raw, extension.as_deref())?;
        validate_file_name(&base)?;

        if mkdir {
            if let Some(parent) = Path::new(&base).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|source| BuildError::Mkdir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
        }

        let frequency_spec = frequency.map(FrequencySpec::starting_now);
        // The date segment needs a period to name, so it requires both
        // options.
        let date = match (&date_format, &frequency_spec) {
            (Some(pattern), Some(spec)) => Some(pattern.format(&local_from_ms(spec.start_ms))),
            _ => None,
        };

        let number = detect_last_number(
            &base,
            frequency_spec.as_ref().map(|spec| spec.start_ms),
            &extension,
        );
        let file_name = build_file_name(&base, date.as_deref(), number, &extension);
        // Resume in place: a previous process may have left this file under
        // the size limit.
        let current_size = fs::metadata(&file_name).map(|m| m.len()).unwrap_or(0);

        let file = open_append(&file_name).map_err(|source| BuildError::Open {
            path: file_name.clone(),
            source,
        })?;
        let writer = BufWriter::new(file);

        if symlink {
            if let Err(err) = crate::symlink::ensure_symlink(&file_name) {
                log::warn!("RollingFileSink: failed to create symlink: {err}");
            }
        }

        let (events, events_rx) = event_channel();
        events.emit(RollEvent::Ready {
            path: file_name.clone(),
        });

        let state = RollState {
            base,
            extension,
            date_format,
            frequency: frequency_spec,
            max_bytes: size.map(|s| s.bytes()),
            limit,
            symlink,
            number,
            date,
            file_name: file_name.clone(),
            current_size,
            created: VecDeque::from([file_name.clone()]),
        };
        let config = WorkerConfig {
            capacity,
            flush_record_interval,
            start_barrier: None,
        };
        let (tx, done_rx, ack_rx, handle) = spawn_worker(writer, state, config, events);

        Ok(RollingFileSink::from_parts(
            tx,
            handle,
            done_rx,
            ack_rx,
            events_rx,
            overflow_policy,
            file_name,
        ))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.flush_record_interval == 0 {
            return Err(ConfigError::ZeroFlushInterval);
        }
        if let OverflowPolicy::Timeout(timeout) = self.overflow_policy {
            if timeout.is_zero() {
                return Err(ConfigError::ZeroOverflowTimeout);
            }
        }
        if let Some(Frequency::Every(interval)) = self.frequency {
            if interval.is_zero() {
                return Err(ConfigError::ZeroFrequency);
            }
        }
        if let Some(limit) = &self.limit {
            if limit.count == 0 {
                return Err(ConfigError::ZeroRetentionCount);
            }
        }
        Ok(())
    }
}
