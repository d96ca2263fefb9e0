//! Forward-protocol sender.
//!
//! This module defines [`FluentSender`], which serialises events into
//! MessagePack frames and streams them to a collector over TCP, TLS or a Unix
//! domain socket. Connection loss is absorbed: frames wait in a byte-capped
//! pending buffer and are delivered in order once a later emit reconnects.
//! [`AsyncSender`] moves the same work onto a worker thread for callers that
//! must never wait on the network.

mod async_sender;
mod backoff;
mod buffer;
mod config;
mod connection;
mod handler;
mod serialise;
mod transport;
mod worker;


pub use async_sender::AsyncSender;
pub use config::{
    BackoffPolicy, DEFAULT_BUFFER_LIMIT, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CLOSE_TIMEOUT,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT, OverflowPolicy,
    SenderConfig,
};
pub use connection::ConnectionState;
pub use handler::{FluentSender, SenderStats};
pub use serialise::{Frame, encode};
pub use transport::{SocketTransport, TcpTransport, TlsOptions, UnixTransport};
