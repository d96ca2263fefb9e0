//! Public sender type exported by the crate.

use std::{fmt, io, time::Instant};

use log::warn;
use parking_lot::Mutex;

use crate::{
    builder::{SenderBuildError, SenderBuilder},
    event::{EventTime, compose_tag},
    rate_limited_warner::RateLimitedWarner,
    sink::EventSink,
    value::Record,
};

use super::{
    backoff::BackoffState,
    buffer::PendingBuffer,
    config::SenderConfig,
    connection::{ConnectionManager, ConnectionState},
    serialise::{Frame, encode},
};

/// Snapshot of a sender's transport and buffer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SenderStats {
    pub state: ConnectionState,
    pub buffered_frames: usize,
    pub buffered_bytes: usize,
    /// Frames discarded by the overflow policy, emitted after close, or left
    /// unsent when the sender closed.
    pub dropped_frames: u64,
    pub closed: bool,
}

struct SenderState {
    connection: ConnectionManager,
    buffer: PendingBuffer,
    backoff: Option<BackoffState>,
    dropped: u64,
    closed: bool,
}

impl SenderState {
    /// Open the connection unless already open or, when `respect_backoff`
    /// is set, the backoff says the next attempt is not due yet.
    fn connect(&mut self, now: Instant, respect_backoff: bool) -> bool {
        if self.connection.is_connected() {
            return true;
        }
        if respect_backoff
            && let Some(backoff) = &self.backoff
            && !backoff.attempt_due(now)
        {
            return false;
        }
        let connected = self.connection.connect();
        if let Some(backoff) = self.backoff.as_mut() {
            if connected {
                backoff.record_success();
            } else {
                backoff.record_failure(now);
            }
        }
        connected
    }

    fn drain(&mut self) -> bool {
        let connection = &mut self.connection;
        self.buffer.drain(|bytes| connection.write(bytes))
    }
}

/// Forwards events to a Fluentd-style collector over a persistent stream.
///
/// `emit` never fails and never blocks longer than the configured connect
/// and write timeouts. While the collector is unreachable, frames wait in a
/// byte-capped pending buffer and are delivered oldest-first ahead of new
/// frames once a connection succeeds. All connection and buffer state sits
/// behind one lock, so concurrent emitters cannot reorder or interleave
/// frames.
pub struct FluentSender {
    config: SenderConfig,
    state: Mutex<SenderState>,
    warner: RateLimitedWarner,
}

impl FluentSender {
    /// Sender for `tag_prefix` targeting `localhost:24224` with defaults.
    pub fn new(tag_prefix: impl Into<String>) -> Result<Self, SenderBuildError> {
        SenderBuilder::new(tag_prefix).build()
    }

    /// Start configuring a sender for `tag_prefix`.
    pub fn builder(tag_prefix: impl Into<String>) -> SenderBuilder {
        SenderBuilder::new(tag_prefix)
    }

    /// Construct the sender from an already validated configuration.
    pub(crate) fn with_config(config: SenderConfig) -> Self {
        let connection = ConnectionManager::new(
            config.transport.clone(),
            config.connect_timeout,
            config.write_timeout,
        );
        let state = SenderState {
            connection,
            buffer: PendingBuffer::new(config.buffer_limit, config.overflow_policy),
            backoff: config.reconnect_backoff.clone().map(BackoffState::new),
            dropped: 0,
            closed: false,
        };
        Self {
            warner: RateLimitedWarner::new(config.warn_interval),
            state: Mutex::new(state),
            config,
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn tag_prefix(&self) -> &str {
        &self.config.tag_prefix
    }

    /// Fully qualified tag for `tag_suffix`.
    pub fn tag_for(&self, tag_suffix: &str) -> String {
        compose_tag(&self.config.tag_prefix, tag_suffix)
    }

    /// Serialise an event and forward or buffer it.
    pub fn emit(&self, tag_suffix: &str, time: impl Into<EventTime>, record: &Record) {
        let frame = encode(&self.tag_for(tag_suffix), time.into(), record);
        self.send_frame(frame);
    }

    /// Emit stamped with the current time in whole seconds.
    pub fn emit_now(&self, tag_suffix: &str, record: &Record) {
        self.emit(tag_suffix, EventTime::now(), record);
    }

    pub(crate) fn send_frame(&self, frame: Frame) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            state.dropped += 1;
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("FluentSender dropped {count} records after close");
            });
            return;
        }

        state.connect(Instant::now(), true);
        if state.connection.is_connected()
            && state.drain()
            && state.connection.write(frame.as_bytes())
        {
            return;
        }

        let dropped = state.buffer.push(frame);
        if dropped > 0 {
            state.dropped += dropped;
            self.warner.record_drops(dropped);
            self.warner.warn_if_due(|count| {
                warn!("FluentSender pending buffer full; dropped {count} records");
            });
        }
    }

    /// Try to connect and deliver everything buffered.
    ///
    /// Returns `true` when the pending buffer is empty afterwards and
    /// `false` after [`close`](Self::close).
    pub fn flush(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        if state.buffer.is_empty() {
            return true;
        }
        state.connect(Instant::now(), false) && state.drain()
    }

    /// Drain the buffer within the close timeout, then shut the connection.
    ///
    /// The reconnect attempt and the drain share the close timeout; a write
    /// already in progress when it expires may still run for up to the write
    /// timeout. Frames still buffered afterwards are discarded. Idempotent;
    /// later emits are dropped.
    pub fn close(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.closed {
            return;
        }
        state.closed = true;

        let deadline = Instant::now() + self.config.close_timeout;
        let connect_budget = self.config.connect_timeout.min(self.config.close_timeout);
        if !state.buffer.is_empty() && state.connection.connect_within(connect_budget) {
            let connection = &mut state.connection;
            state
                .buffer
                .drain(|bytes| Instant::now() < deadline && connection.write(bytes));
        }
        state.connection.close();

        self.warner.flush(|count| {
            warn!("FluentSender pending buffer full; dropped {count} records");
        });
        let abandoned = state.buffer.clear();
        if abandoned > 0 {
            state.dropped += abandoned;
            warn!(
                "FluentSender discarded {abandoned} buffered records on close; {} unreachable",
                self.config.transport
            );
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn stats(&self) -> SenderStats {
        let state = self.state.lock();
        SenderStats {
            state: state.connection.state(),
            buffered_frames: state.buffer.len(),
            buffered_bytes: state.buffer.bytes(),
            dropped_frames: state.dropped,
            closed: state.closed,
        }
    }

    /// Description of the most recent transport failure, if any.
    pub fn last_error(&self) -> Option<(io::ErrorKind, String)> {
        self.state
            .lock()
            .connection
            .last_error()
            .map(|err| (err.kind(), err.to_string()))
    }
}

impl EventSink for FluentSender {
    fn emit(&self, tag_suffix: &str, time: EventTime, record: &Record) {
        FluentSender::emit(self, tag_suffix, time, record);
    }

    fn close(&self) {
        FluentSender::close(self);
    }
}

impl Drop for FluentSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FluentSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FluentSender")
            .field("tag_prefix", &self.config.tag_prefix)
            .field("transport", &self.config.transport)
            .finish()
    }
}
