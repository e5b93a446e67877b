//! Public handle for the rotating file sink.
//!
//! [`RollingFileSink`] accepts opaque byte records and hands them to a
//! worker thread that owns the file and performs every rotation. The handle
//! never touches the filesystem itself: `write` enqueues, `flush` is a
//! synchronous handshake with the worker, and `close` (also run by `Drop`)
//! shuts the worker down after draining queued records.

pub(crate) mod worker;

use std::{
    io,
    path::PathBuf,
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};

use crate::{
    error::WriteError,
    events::RollEvent,
};

use worker::SinkCommand;

/// Default bounded queue size for records waiting on the worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// How the sink reacts when its record queue is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop new records, preserving queued ones.
    Drop,
    /// Block the caller until space becomes available.
    Block,
    /// Block up to the given duration before giving up.
    Timeout(Duration),
}

/// A log destination that transparently rotates its file.
///
/// Built with [`RollingSinkBuilder`](crate::RollingSinkBuilder). Cheap to
/// share behind an `Arc`: `write` and `flush` take `&self`.
#[derive(Debug)]
pub struct RollingFileSink {
    tx: Option<Sender<SinkCommand>>,
    handle: Option<JoinHandle<()>>,
    done_rx: Receiver<()>,
    ack_rx: Receiver<()>,
    events_rx: Receiver<RollEvent>,
    overflow_policy: OverflowPolicy,
    initial_file: PathBuf,
}

impl RollingFileSink {
    pub(crate) fn from_parts(
        tx: Sender<SinkCommand>,
        handle: JoinHandle<()>,
        done_rx: Receiver<()>,
        ack_rx: Receiver<()>,
        events_rx: Receiver<RollEvent>,
        overflow_policy: OverflowPolicy,
        initial_file: PathBuf,
    ) -> Self {
        RollingFileSink {
            tx: Some(tx),
            handle: Some(handle),
            done_rx,
            ack_rx,
            events_rx,
            overflow_policy,
            initial_file,
        }
    }

    /// The file that was active when the sink was built.
    ///
    /// Rotation moves on without updating this; watch
    /// [`events`](Self::events) for [`RollEvent::Rotated`] to follow the
    /// active file.
    pub fn initial_file(&self) -> &PathBuf {
        &self.initial_file
    }

    /// Enqueue one record under the configured overflow policy.
    ///
    /// Records are opaque bytes; the sink appends them verbatim, so a
    /// producer of line-oriented logs should include the trailing newline.
    pub fn write(&self, record: &[u8]) -> Result<(), WriteError> {
        let Some(tx) = &self.tx else {
            log::warn!("RollingFileSink: write called after close");
            return Err(WriteError::Closed);
        };
        let command = SinkCommand::Record(record.to_vec());
        match self.overflow_policy {
            OverflowPolicy::Drop => match tx.try_send(command) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    log::warn!("RollingFileSink: queue full, dropping record");
                    Err(WriteError::QueueFull)
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::warn!("RollingFileSink: queue closed, dropping record");
                    Err(WriteError::Closed)
                }
            },
            OverflowPolicy::Block => tx.send(command).map_err(|_| {
                log::warn!("RollingFileSink: queue closed, dropping record");
                WriteError::Closed
            }),
            OverflowPolicy::Timeout(timeout) => match tx.send_timeout(command, timeout) {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => {
                    log::warn!("RollingFileSink: timed out waiting for queue space");
                    Err(WriteError::Timeout(timeout))
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    log::warn!("RollingFileSink: queue closed, dropping record");
                    Err(WriteError::Closed)
                }
            },
        }
    }

    /// Flush queued records through to the file.
    ///
    /// Returns `true` when the worker acknowledges within one second,
    /// `false` when the sink is closed or the worker cannot confirm in time.
    /// Every record accepted before the call, and every rotation those
    /// records triggered, has completed once this returns `true`.
    pub fn flush(&self) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        if tx.send(SinkCommand::Flush).is_err() {
            return false;
        }
        self.ack_rx.recv_timeout(Duration::from_secs(1)).is_ok()
    }

    /// Lifecycle notifications: `Ready`, `Rotated`, `CleanupComplete`,
    /// `Closed`, and recoverable `Error`s.
    ///
    /// The stream is advisory; if nobody drains it, old events are dropped.
    pub fn events(&self) -> &Receiver<RollEvent> {
        &self.events_rx
    }

    /// Close the sink and wait for the worker to drain and exit.
    ///
    /// Idempotent; only the first call performs shutdown work. Queued
    /// records are written before the worker stops. Retention passes still
    /// in flight are joined by the worker on its way out.
    pub fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if self.done_rx.recv_timeout(Duration::from_secs(1)).is_err() {
                log::warn!("RollingFileSink: worker did not shut down within 1s");
                return;
            }
            if handle.join().is_err() {
                log::warn!("RollingFileSink: worker thread panicked");
            }
        }
    }
}

/// Writer adapter for producers that speak `std::io::Write`.
///
/// Each `write` call is treated as one record; errors map onto
/// `WouldBlock`/`TimedOut`/`BrokenPipe`.
impl io::Write for RollingFileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match RollingFileSink::write(self, buf) {
            Ok(()) => Ok(buf.len()),
            Err(err @ WriteError::QueueFull) => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, err))
            }
            Err(err @ WriteError::Timeout(_)) => {
                Err(io::Error::new(io::ErrorKind::TimedOut, err))
            }
            Err(err @ WriteError::Closed) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, err))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if RollingFileSink::flush(self) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "flush was not acknowledged",
            ))
        }
    }
}

impl Drop for RollingFileSink {
    fn drop(&mut self) {
        self.close();
    }
}
