//! Builder for [`FluentSender`] and [`AsyncSender`].
//!
//! Collects transport selection, timeouts, TLS options, buffer sizing and
//! reconnect backoff, validates them, and produces a ready sender. All
//! caller-visible configuration errors surface here.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{
    event::validate_tag_prefix,
    sender::{
        AsyncSender, BackoffPolicy, DEFAULT_CHANNEL_CAPACITY, DEFAULT_HOST, DEFAULT_PORT, FluentSender,
        OverflowPolicy, SenderConfig, SocketTransport, TcpTransport, TlsOptions,
    },
};

mod ini;

/// Errors that may occur while building a sender.
#[derive(Debug, Error)]
pub enum SenderBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid sender configuration: {0}")]
    InvalidConfig(String),
    /// Malformed or incomplete configuration file.
    #[error("invalid sender configuration file: {0}")]
    Ini(String),
    /// Underlying I/O error whilst reading configuration or spawning the worker.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Clone, Debug)]
enum TransportConfig {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

#[derive(Clone, Debug, Default)]
struct TlsConfig {
    domain: Option<String>,
    insecure: bool,
}

/// Overrides for the reconnect backoff timings.
#[derive(Clone, Debug, Default)]
pub struct BackoffOverrides {
    base_ms: Option<u64>,
    cap_ms: Option<u64>,
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(SenderBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the base delay in milliseconds.
    pub fn with_base_ms(mut self, base_ms: u64) -> Self {
        self.base_ms = Some(base_ms);
        self
    }

    /// Override the delay cap in milliseconds.
    pub fn with_cap_ms(mut self, cap_ms: u64) -> Self {
        self.cap_ms = Some(cap_ms);
        self
    }

    fn to_policy(&self) -> Result<BackoffPolicy, SenderBuildError> {
        let mut policy = BackoffPolicy::default();
        if let Some(base) = self.base_ms {
            ensure_positive!(base, "backoff_base_ms")?;
            policy.base = Duration::from_millis(base);
        }
        if let Some(cap) = self.cap_ms {
            ensure_positive!(cap, "backoff_cap_ms")?;
            policy.cap = Duration::from_millis(cap);
        }
        if policy.cap < policy.base {
            return Err(SenderBuildError::InvalidConfig(
                "backoff_cap_ms must not be smaller than backoff_base_ms".into(),
            ));
        }
        Ok(policy)
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`FluentSender`] instances.
#[derive(Clone, Debug)]
pub struct SenderBuilder {
    tag_prefix: String,
    transport: Option<TransportConfig>,
    tls: Option<TlsConfig>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    close_timeout_ms: Option<u64>,
    buffer_limit: Option<usize>,
    overflow_policy: Option<OverflowPolicy>,
    backoff: Option<BackoffOverrides>,
    capacity: Option<usize>,
    warn_interval: Option<Duration>,
}

impl SenderBuilder {
    /// Create a builder for `tag_prefix` targeting `localhost:24224`.
    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
            transport: None,
            tls: None,
            connect_timeout_ms: None,
            write_timeout_ms: None,
            close_timeout_ms: None,
            buffer_limit: None,
            overflow_policy: None,
            backoff: None,
            capacity: None,
            warn_interval: None,
        }
    }

    /// Forward over TCP to `host:port`.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
        self.transport = Some(TransportConfig::Tcp {
            host: host.into(),
            port,
        });
        self
    }

    /// Forward over a Unix domain socket.
    pub fn with_unix_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transport = Some(TransportConfig::Unix { path: path.into() });
        self
    }

    /// Wrap the TCP stream in TLS. `domain` defaults to the host name.
    pub fn with_tls(mut self, domain: Option<String>, insecure: bool) -> Self {
        self.tls = Some(TlsConfig { domain, insecure });
        self
    }

    /// Apply one timeout to both connecting and writing.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self.with_connect_timeout_ms(ms).with_write_timeout_ms(ms)
    }

    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(
        #[doc = "Set the time budget for draining the buffer on close."]
        with_close_timeout_ms,
        close_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Cap the bytes held while the collector is unreachable."]
        with_buffer_limit,
        buffer_limit,
        usize
    );
    option_setter!(with_overflow_policy, overflow_policy, OverflowPolicy);
    option_setter!(
        #[doc = "Set the queue capacity used by [`build_async`](Self::build_async)."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(with_warn_interval, warn_interval, Duration);

    /// Enable reconnect backoff using the provided overrides.
    ///
    /// See [`BackoffOverrides`] for fluent helpers when constructing the
    /// override set.
    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = Some(overrides);
        self
    }

    fn validate(&self) -> Result<(), SenderBuildError> {
        validate_tag_prefix(&self.tag_prefix).map_err(SenderBuildError::InvalidConfig)?;
        self.validate_transport()?;
        self.validate_timeouts()?;
        self.validate_sizes()?;
        Ok(())
    }

    fn validate_transport(&self) -> Result<(), SenderBuildError> {
        match &self.transport {
            Some(TransportConfig::Unix { .. }) if self.tls.is_some() => Err(
                SenderBuildError::InvalidConfig("tls is only supported for tcp transports".into()),
            ),
            Some(TransportConfig::Tcp { host, port }) => {
                if host.trim().is_empty() {
                    return Err(SenderBuildError::InvalidConfig(
                        "host must not be empty".into(),
                    ));
                }
                ensure_positive!(*port, "port")?;
                Ok(())
            }
            Some(TransportConfig::Unix { path }) if path.as_os_str().is_empty() => Err(
                SenderBuildError::InvalidConfig("unix socket path must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }

    fn validate_timeouts(&self) -> Result<(), SenderBuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        if let Some(timeout) = self.close_timeout_ms {
            ensure_positive!(timeout, "close_timeout_ms")?;
        }
        Ok(())
    }

    fn validate_sizes(&self) -> Result<(), SenderBuildError> {
        if let Some(limit) = self.buffer_limit {
            ensure_positive!(limit, "buffer_limit")?;
        }
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        Ok(())
    }

    fn build_transport(&self) -> SocketTransport {
        match self.transport.clone() {
            None => apply_tls(
                SocketTransport::tcp(DEFAULT_HOST, DEFAULT_PORT),
                self.tls.as_ref(),
            ),
            Some(TransportConfig::Tcp { host, port }) => {
                apply_tls(SocketTransport::tcp(host, port), self.tls.as_ref())
            }
            Some(TransportConfig::Unix { path }) => SocketTransport::unix(path),
        }
    }

    /// Validate the builder and produce the sender configuration.
    pub fn build_config(&self) -> Result<SenderConfig, SenderBuildError> {
        self.validate()?;
        let mut config = SenderConfig::with_defaults(self.tag_prefix.clone());
        config.transport = self.build_transport();
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.close_timeout_ms {
            config.close_timeout = Duration::from_millis(ms);
        }
        if let Some(limit) = self.buffer_limit {
            config.buffer_limit = limit;
        }
        if let Some(policy) = self.overflow_policy {
            config.overflow_policy = policy;
        }
        if let Some(interval) = self.warn_interval {
            config.warn_interval = interval;
        }
        config.reconnect_backoff = self
            .backoff
            .as_ref()
            .map(BackoffOverrides::to_policy)
            .transpose()?;
        Ok(config)
    }

    /// Build a sender that does its I/O on the calling thread.
    pub fn build(&self) -> Result<FluentSender, SenderBuildError> {
        Ok(FluentSender::with_config(self.build_config()?))
    }

    /// Build a sender whose I/O runs on a dedicated worker thread.
    pub fn build_async(&self) -> Result<AsyncSender, SenderBuildError> {
        let sender = self.build()?;
        let capacity = self.capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        Ok(AsyncSender::spawn(sender, capacity)?)
    }
}

/// Attach TLS options to a TCP transport; the domain defaults to the host.
fn apply_tls(transport: SocketTransport, tls: Option<&TlsConfig>) -> SocketTransport {
    match (transport, tls) {
        (SocketTransport::Tcp(TcpTransport { host, port, .. }), Some(tls)) => {
            SocketTransport::Tcp(TcpTransport {
                tls: Some(TlsOptions {
                    domain: tls.domain.clone().unwrap_or_else(|| host.clone()),
                    insecure_skip_verify: tls.insecure,
                }),
                host,
                port,
            })
        }
        (transport, _) => transport,
    }
}
