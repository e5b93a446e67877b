//! Advisory event stream emitted by the rotation engine.
//!
//! Events are observability, not control flow: the engine emits with
//! `try_send` on a bounded channel and keeps going whether or not anyone is
//! listening. A full or disconnected channel drops the event.

use std::path::PathBuf;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::RollError;

/// How many undelivered events the engine buffers before dropping new ones.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Lifecycle notifications from the sink.
#[derive(Debug)]
pub enum RollEvent {
    /// The initial file is open and the worker is accepting records.
    Ready { path: PathBuf },
    /// A rotation completed; `path` is the newly active file.
    Rotated { path: PathBuf },
    /// A retention pass finished without errors.
    CleanupComplete,
    /// The worker flushed and exited.
    Closed,
    /// A recoverable failure; the engine carries on.
    Error(RollError),
}

/// Cloneable emitting side of the event stream.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Sender<RollEvent>,
}

impl EventSink {
    pub(crate) fn emit(&self, event: RollEvent) {
        if self.tx.try_send(event).is_err() {
            log::debug!("RollingFileSink: event channel full or disconnected, dropping event");
        }
    }
}

pub(crate) fn event_channel() -> (EventSink, Receiver<RollEvent>) {
    let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
    (EventSink { tx }, rx)
}
