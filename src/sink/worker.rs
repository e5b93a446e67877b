//! Background worker owning the active file and the rotation state.
//!
//! The worker drains a bounded command channel, racing it against the next
//! rotation deadline. All engine state (sequence number, date segment,
//! current size, created-files FIFO) lives here, on one thread, so rotations
//! serialise naturally between record writes: bytes accepted before a
//! trigger land in the file that was active at the trigger, bytes accepted
//! after land in its successor.
//!
//! Retention runs on a short-lived helper thread, one pass at a time; the
//! worker joins the previous pass before starting the next and joins the
//! last one on shutdown.

use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Barrier},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::{
    error::RollError,
    events::{EventSink, RollEvent},
    filename::build_file_name,
    frequency::{local_from_ms, FrequencySpec},
    pattern::DatePattern,
    retention::{
        prune_created, sweep_directory, unlink_with_retry, RetentionLimit, UNLINK_MAX_ATTEMPTS,
        UNLINK_RETRY_DELAY,
    },
    symlink::{ensure_symlink, SYMLINK_NAME},
};

/// Commands sent to the worker thread.
pub(crate) enum SinkCommand {
    Record(Vec<u8>),
    Flush,
}

/// Tuning for the worker thread.
pub(crate) struct WorkerConfig {
    pub(crate) capacity: usize,
    pub(crate) flush_record_interval: usize,
    /// Holds the worker before its first pop; lets tests fill the queue
    /// deterministically.
    pub(crate) start_barrier: Option<Arc<Barrier>>,
}

/// Mutable rotation state, owned exclusively by the worker.
pub(crate) struct RollState {
    pub(crate) base: String,
    pub(crate) extension: String,
    pub(crate) date_format: Option<DatePattern>,
    pub(crate) frequency: Option<FrequencySpec>,
    pub(crate) max_bytes: Option<u64>,
    pub(crate) limit: Option<RetentionLimit>,
    pub(crate) symlink: bool,
    pub(crate) number: u32,
    pub(crate) date: Option<String>,
    pub(crate) file_name: PathBuf,
    pub(crate) current_size: u64,
    pub(crate) created: VecDeque<PathBuf>,
}

pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Spawn the worker; returns the command sender plus the shutdown and
/// flush-acknowledgement receivers.
pub(crate) fn spawn_worker(
    writer: BufWriter<File>,
    state: RollState,
    config: WorkerConfig,
    events: EventSink,
) -> (Sender<SinkCommand>, Receiver<()>, Receiver<()>, JoinHandle<()>) {
    let WorkerConfig {
        capacity,
        flush_record_interval,
        start_barrier,
    } = config;
    let (tx, rx) = bounded(capacity);
    let (done_tx, done_rx) = bounded(1);
    let (ack_tx, ack_rx) = bounded(1);
    let handle = thread::spawn(move || {
        if let Some(barrier) = start_barrier {
            barrier.wait();
        }
        let deadline = state.frequency.map(|spec| deadline_for(spec.next_ms));
        Worker {
            rx,
            ack_tx,
            done_tx,
            events,
            writer,
            tracker: FlushTracker::new(flush_record_interval),
            state,
            deadline,
            retention: None,
        }
        .run();
    });
    (tx, done_rx, ack_rx, handle)
}

/// Map an epoch-millisecond boundary onto the monotonic clock.
fn deadline_for(next_ms: i64) -> Instant {
    let now_ms = Utc::now().timestamp_millis();
    Instant::now() + Duration::from_millis(next_ms.saturating_sub(now_ms).max(0) as u64)
}

/// Flushes the writer every N records.
pub(crate) struct FlushTracker {
    writes: usize,
    flush_interval: usize,
}

impl FlushTracker {
    pub(crate) fn new(flush_interval: usize) -> Self {
        FlushTracker {
            writes: 0,
            flush_interval,
        }
    }

    pub(crate) fn record_write<W: Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.writes += 1;
        if self.is_due() {
            writer.flush()?;
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.writes = 0;
    }

    fn is_due(&self) -> bool {
        self.flush_interval != 0 && self.writes > 0 && self.writes % self.flush_interval == 0
    }
}

struct Worker {
    rx: Receiver<SinkCommand>,
    ack_tx: Sender<()>,
    done_tx: Sender<()>,
    events: EventSink,
    writer: BufWriter<File>,
    tracker: FlushTracker,
    state: RollState,
    deadline: Option<Instant>,
    retention: Option<JoinHandle<()>>,
}

impl Worker {
    fn run(mut self) {
        loop {
            // A busy queue must not starve the timer: fire any boundary that
            // has already passed before popping the next record.
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    self.on_boundary();
                    continue;
                }
            }
            let command = match self.deadline {
                Some(deadline) => match self.rx.recv_deadline(deadline) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        self.on_boundary();
                        continue;
                    }
                    // All senders dropped: the sink was closed. Queued
                    // records have already drained in order.
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            match command {
                SinkCommand::Record(bytes) => self.on_record(bytes),
                SinkCommand::Flush => self.on_flush(),
            }
        }
        self.shutdown();
    }

    fn on_record(&mut self, bytes: Vec<u8>) {
        if let Err(source) = self.writer.write_all(&bytes) {
            log::warn!("RollingFileSink: write error: {source}");
            self.events.emit(RollEvent::Error(RollError::Write {
                path: self.state.file_name.clone(),
                source,
            }));
            return;
        }
        if let Err(err) = self.tracker.record_write(&mut self.writer) {
            log::warn!("RollingFileSink: flush after write failed: {err}");
        }

        self.state.current_size += bytes.len() as u64;
        let Some(max_bytes) = self.state.max_bytes else {
            return;
        };
        if self.state.current_size >= max_bytes {
            // The triggering record is accounted to the file it was written
            // to; the successor starts empty.
            self.state.number += 1;
            self.state.file_name = self.compose_name();
            self.state.current_size = 0;
            self.roll();
        }
    }

    fn on_boundary(&mut self) {
        let Some(mut spec) = self.state.frequency else {
            self.deadline = None;
            return;
        };
        if let Some(pattern) = &self.state.date_format {
            let stamp = pattern.format(&local_from_ms(spec.next_ms));
            // A new date segment disambiguates from the previous period, so
            // the sequence restarts.
            if self.state.date.as_deref() != Some(stamp.as_str()) {
                self.state.number = 0;
            }
            self.state.date = Some(stamp);
        }
        self.state.number += 1;
        self.state.file_name = self.compose_name();
        self.state.current_size = 0;
        self.roll();
        spec.advance();
        self.deadline = Some(deadline_for(spec.next_ms));
        self.state.frequency = Some(spec);
    }

    fn on_flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            log::warn!("RollingFileSink: flush error: {err}");
        }
        self.tracker.reset();
        if self.ack_tx.try_send(()).is_err() {
            log::debug!("RollingFileSink: flush ack not delivered");
        }
    }

    /// The rotation sequence: flush, reopen, symlink, retention.
    ///
    /// A flush failure skips the reopen entirely; a reopen failure keeps the
    /// old file. Either way the engine keeps accepting records and tries
    /// again at the next trigger.
    fn roll(&mut self) {
        if let Err(source) = self.writer.flush() {
            log::warn!("RollingFileSink: flush before rotation failed: {source}");
            self.events
                .emit(RollEvent::Error(RollError::Flush { source }));
            return;
        }
        self.tracker.reset();

        match open_append(&self.state.file_name) {
            Ok(file) => self.writer = BufWriter::new(file),
            Err(source) => {
                log::warn!(
                    "RollingFileSink: reopen of '{}' failed: {source}",
                    self.state.file_name.display()
                );
                self.events.emit(RollEvent::Error(RollError::Reopen {
                    path: self.state.file_name.clone(),
                    source,
                }));
                return;
            }
        }

        if self.state.symlink {
            if let Err(err) = ensure_symlink(&self.state.file_name) {
                log::warn!("RollingFileSink: failed to update {SYMLINK_NAME}: {err}");
            }
        }

        // Emitted once the successor is open and linked; retention still
        // runs in the background.
        self.events.emit(RollEvent::Rotated {
            path: self.state.file_name.clone(),
        });

        self.run_retention();
    }

    fn run_retention(&mut self) {
        let Some(limit) = self.state.limit else {
            return;
        };
        self.join_retention();

        let events = self.events.clone();
        if limit.remove_other_log_files {
            let base = self.state.base.clone();
            let date_format = self.state.date_format.clone();
            let extension = self.state.extension.clone();
            self.retention = Some(thread::spawn(move || {
                match sweep_directory(&base, date_format.as_ref(), &extension, limit.count) {
                    Ok(_) => events.emit(RollEvent::CleanupComplete),
                    Err(err) => {
                        log::warn!("RollingFileSink: retention sweep failed: {err}");
                        events.emit(RollEvent::Error(err));
                    }
                }
            }));
        } else {
            self.state.created.push_back(self.state.file_name.clone());
            let doomed = prune_created(&mut self.state.created, limit.count);
            self.retention = Some(thread::spawn(move || {
                let mut clean = true;
                for path in doomed {
                    if let Err(source) =
                        unlink_with_retry(&path, UNLINK_MAX_ATTEMPTS, UNLINK_RETRY_DELAY)
                    {
                        clean = false;
                        log::warn!(
                            "RollingFileSink: failed to remove '{}': {source}",
                            path.display()
                        );
                        events.emit(RollEvent::Error(RollError::Unlink { path, source }));
                    }
                }
                if clean {
                    events.emit(RollEvent::CleanupComplete);
                }
            }));
        }
    }

    fn join_retention(&mut self) {
        if let Some(handle) = self.retention.take() {
            if handle.join().is_err() {
                log::warn!("RollingFileSink: retention thread panicked");
            }
        }
    }

    fn compose_name(&self) -> PathBuf {
        build_file_name(
            &self.state.base,
            self.state.date.as_deref(),
            self.state.number,
            &self.state.extension,
        )
    }

    fn shutdown(mut self) {
        if let Err(err) = self.writer.flush() {
            log::warn!("RollingFileSink: final flush failed: {err}");
        }
        self.join_retention();
        self.events.emit(RollEvent::Closed);
        let _ = self.done_tx.send(());
    }
}

#[cfg(test)]
mod flush_tracker_tests {
    use super::*;
    use rstest::rstest;

    #[derive(Default)]
    struct CountingWriter {
        flushed: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed += 1;
            Ok(())
        }
    }

    #[rstest]
    #[case::every_record(1, 3, 3)]
    #[case::every_other_record(2, 4, 2)]
    #[case::interval_not_yet_reached(3, 2, 0)]
    fn flushes_on_the_configured_interval(
        #[case] interval: usize,
        #[case] writes: usize,
        #[case] expected_flushes: usize,
    ) {
        let mut writer = CountingWriter::default();
        let mut tracker = FlushTracker::new(interval);
        for _ in 0..writes {
            tracker
                .record_write(&mut writer)
                .expect("counting writer never fails");
        }
        assert_eq!(writer.flushed, expected_flushes);
    }

    #[test]
    fn reset_restarts_the_interval() {
        let mut writer = CountingWriter::default();
        let mut tracker = FlushTracker::new(2);
        tracker
            .record_write(&mut writer)
            .expect("counting writer never fails");
        tracker.reset();
        tracker
            .record_write(&mut writer)
            .expect("counting writer never fails");
        assert_eq!(writer.flushed, 0, "reset must restart the write count");
    }
}
