//! Configuration structures consumed by the sender lifecycle.
//!
//! [`SenderBuilder`](crate::SenderBuilder) validates and constructs these
//! values before handing them to [`FluentSender`](super::FluentSender).

use std::{fmt, str::FromStr, time::Duration};

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

use super::transport::{SocketTransport, TcpTransport};

/// Default collector host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default collector port of the forward protocol.
pub const DEFAULT_PORT: u16 = 24224;
/// Default connection timeout applied when establishing sockets.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
/// Default time budget for draining the pending buffer on close.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default cap on bytes held in the pending buffer.
pub const DEFAULT_BUFFER_LIMIT: usize = 8 << 20; // 8 MiB
/// Default bounded channel capacity used by the async sender.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default base delay for reconnect backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default maximum delay for reconnect backoff.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);

/// What the pending buffer does when a new frame does not fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered frames until the new frame fits.
    #[default]
    DropOldest,
    /// Keep the buffered frames and discard the new one.
    DropNewest,
}

const VALID_POLICIES: &str = "drop_oldest, drop_newest";

impl FromStr for OverflowPolicy {
    type Err = String;

    /// Parse `drop_oldest` or `drop_newest`, case-insensitively, accepting
    /// `-` in place of `_`.
    fn from_str(policy: &str) -> Result<Self, Self::Err> {
        let normalized = policy.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            _ => Err(format!(
                "invalid overflow policy '{normalized}'. Valid options are: {VALID_POLICIES}"
            )),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
        })
    }
}

/// Exponential backoff policy for reconnection attempts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
        }
    }
}

/// Validated configuration for a [`FluentSender`](super::FluentSender).
#[derive(Clone, Debug)]
pub struct SenderConfig {
    pub tag_prefix: String,
    pub transport: SocketTransport,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub close_timeout: Duration,
    pub buffer_limit: usize,
    pub overflow_policy: OverflowPolicy,
    /// Deferral between failed connect attempts; `None` retries on every emit.
    pub reconnect_backoff: Option<BackoffPolicy>,
    pub warn_interval: Duration,
}

impl SenderConfig {
    /// Configuration with every default applied for the given tag prefix.
    pub(crate) fn with_defaults(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
            transport: SocketTransport::Tcp(TcpTransport {
                host: DEFAULT_HOST.into(),
                port: DEFAULT_PORT,
                tls: None,
            }),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            overflow_policy: OverflowPolicy::default(),
            reconnect_backoff: None,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}
