//! Ownership of the single outbound stream.
//!
//! Every I/O failure stops here: callers get `bool` status values and the
//! error is kept for inspection.

use std::{
    io::{self, Write},
    time::Duration,
};

use log::debug;

use super::transport::{CollectorStream, SocketTransport};

/// Whether the sender currently holds a live stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub(crate) struct ConnectionManager {
    transport: SocketTransport,
    connect_timeout: Duration,
    write_timeout: Duration,
    stream: Option<CollectorStream>,
    last_error: Option<io::Error>,
}

impl ConnectionManager {
    pub fn new(transport: SocketTransport, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
            write_timeout,
            stream: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Most recent connect or write failure, cleared by a successful connect.
    pub fn last_error(&self) -> Option<&io::Error> {
        self.last_error.as_ref()
    }

    /// Open the stream if it is not already open.
    pub fn connect(&mut self) -> bool {
        self.connect_within(self.connect_timeout)
    }

    /// Open the stream, bounding the attempt by `timeout` instead of the
    /// configured connect timeout.
    pub fn connect_within(&mut self, timeout: Duration) -> bool {
        if self.stream.is_some() {
            return true;
        }
        let opened = self.transport.open(timeout).and_then(|stream| {
            stream.set_write_timeout(self.write_timeout)?;
            Ok(stream)
        });
        match opened {
            Ok(stream) => {
                debug!("FluentSender connected to {}", self.transport);
                self.stream = Some(stream);
                self.last_error = None;
                true
            }
            Err(err) => {
                debug!("FluentSender failed to connect to {}: {err}", self.transport);
                self.last_error = Some(err);
                false
            }
        }
    }

    /// Write and flush `bytes`; any failure drops the stream.
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.write_all(bytes).and_then(|()| stream.flush()) {
            Ok(()) => true,
            Err(err) => {
                debug!("FluentSender write to {} failed: {err}", self.transport);
                self.stream = None;
                self.last_error = Some(err);
                false
            }
        }
    }

    /// Shut the stream down, ignoring errors. Safe to call repeatedly.
    pub fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        if let Err(err) = stream.close() {
            debug!("FluentSender error while closing {}: {err}", self.transport);
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
