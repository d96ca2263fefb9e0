//! Client for forwarding structured log events to a Fluentd-compatible
//! collector.
//!
//! Each event is a `[tag, time, record]` MessagePack array written to a
//! persistent TCP, TLS or Unix domain socket stream. [`FluentSender`] absorbs
//! collector outages by buffering frames and replaying them in order when
//! the connection returns; it never reports transport failures to the
//! caller.
//!
//! ```no_run
//! use fluent_sender::{FluentSender, record};
//!
//! let sender = FluentSender::builder("app")
//!     .with_tcp("localhost", 24224)
//!     .build()?;
//! sender.emit_now("access", &record! { "path" => "/", "status" => 200 });
//! sender.close();
//! # Ok::<(), fluent_sender::SenderBuildError>(())
//! ```

mod builder;
mod event;
mod lazy;
pub mod rate_limited_warner;
pub mod sender;
mod sink;
pub mod value;

pub use builder::{BackoffOverrides, SenderBuildError, SenderBuilder};
pub use event::{EVENT_TIME_EXT_TYPE, EventTime};
pub use lazy::LazySender;
pub use sender::{
    AsyncSender, BackoffPolicy, ConnectionState, FluentSender, Frame, OverflowPolicy,
    SenderConfig, SenderStats, SocketTransport, TcpTransport, TlsOptions, UnixTransport, encode,
};
pub use sink::EventSink;
pub use value::{Record, Value};
