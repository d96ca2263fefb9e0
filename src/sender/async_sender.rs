//! Non-blocking front end over [`FluentSender`].

use std::{
    fmt,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use log::warn;
use parking_lot::Mutex;

use crate::{
    event::{EventTime, compose_tag},
    rate_limited_warner::RateLimitedWarner,
    sink::EventSink,
    value::Record,
};

use super::{
    handler::FluentSender,
    serialise::encode,
    worker::{
        SenderCommand, StopDeadline, enqueue_frame, flush_queue, shutdown_queue, spawn_worker,
    },
};

/// Runs a [`FluentSender`] on a dedicated worker thread.
///
/// `emit` serialises on the caller's thread and hands the frame to a bounded
/// queue, so it never waits on the network. When the queue is full the frame
/// is dropped and counted. Frames from one `AsyncSender` reach the collector
/// in emission order.
///
/// [`close`](Self::close) returns within the flush timeout
/// (`close_timeout + connect_timeout`) even when the collector stalls; queued
/// frames not written by then are discarded.
pub struct AsyncSender {
    tag_prefix: String,
    tx: Mutex<Option<Sender<SenderCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    warner: RateLimitedWarner,
    flush_timeout: Duration,
    close_timeout: Duration,
    stop_at: StopDeadline,
}

impl AsyncSender {
    pub(crate) fn spawn(sender: FluentSender, capacity: usize) -> std::io::Result<Self> {
        let tag_prefix = sender.tag_prefix().to_owned();
        let warner = RateLimitedWarner::new(sender.config().warn_interval);
        let config = sender.config();
        let flush_timeout = config.close_timeout + config.connect_timeout;
        let close_timeout = config.close_timeout;
        let stop_at = StopDeadline::default();
        let (tx, handle) = spawn_worker(sender, capacity, Arc::clone(&stop_at))?;
        Ok(Self {
            tag_prefix,
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            warner,
            flush_timeout,
            close_timeout,
            stop_at,
        })
    }

    pub fn tag_prefix(&self) -> &str {
        &self.tag_prefix
    }

    fn sender(&self) -> Option<Sender<SenderCommand>> {
        self.tx.lock().as_ref().cloned()
    }

    /// Serialise an event and queue it for the worker.
    ///
    /// Returns `false` when the frame was dropped.
    pub fn emit(&self, tag_suffix: &str, time: impl Into<EventTime>, record: &Record) -> bool {
        let frame = encode(&compose_tag(&self.tag_prefix, tag_suffix), time.into(), record);
        let Some(tx) = self.sender() else {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("AsyncSender dropped {count} records after close");
            });
            return false;
        };
        enqueue_frame(&tx, frame, &self.warner)
    }

    /// Wait for queued frames to reach the sender and its buffer to drain.
    pub fn flush(&self) -> bool {
        let Some(tx) = self.sender() else {
            return false;
        };
        self.warner.flush(|count| {
            warn!("AsyncSender dropped {count} records in the last interval");
        });
        flush_queue(&tx, self.flush_timeout)
    }

    /// Deliver queued frames, close the sender and join the worker.
    ///
    /// Queued frames are written until the close timeout passes; the rest
    /// are discarded. If the worker has not acknowledged shutdown within the
    /// flush timeout it is detached and finishes in the background.
    pub fn close(&self) {
        let Some(tx) = self.tx.lock().take() else {
            return;
        };
        let started = Instant::now();
        let _ = self.stop_at.set(started + self.close_timeout);
        let acknowledged = shutdown_queue(&tx, started + self.flush_timeout);
        drop(tx);
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if !acknowledged {
            warn!("AsyncSender: worker did not acknowledge shutdown in time; detaching it");
            return;
        }
        if handle.join().is_err() {
            warn!("AsyncSender: worker thread panicked");
        }
    }
}

impl EventSink for AsyncSender {
    fn emit(&self, tag_suffix: &str, time: EventTime, record: &Record) {
        AsyncSender::emit(self, tag_suffix, time, record);
    }

    fn close(&self) {
        AsyncSender::close(self);
    }
}

impl Drop for AsyncSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for AsyncSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSender")
            .field("tag_prefix", &self.tag_prefix)
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}
