//! Stream endpoints the sender can forward to.

use std::{
    fmt,
    io::{self, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    path::PathBuf,
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Transport targeted by the sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketTransport {
    /// TCP transport with optional TLS.
    Tcp(TcpTransport),
    /// Unix domain socket transport.
    Unix(UnixTransport),
}

impl SocketTransport {
    /// Plain TCP transport to `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp(TcpTransport {
            host: host.into(),
            port,
            tls: None,
        })
    }

    /// Unix domain socket transport at `path`.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(UnixTransport { path: path.into() })
    }
}

impl fmt::Display for SocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(tcp) if tcp.tls.is_some() => write!(f, "tls://{}:{}", tcp.host, tcp.port),
            Self::Tcp(tcp) => write!(f, "tcp://{}:{}", tcp.host, tcp.port),
            Self::Unix(unix) => write!(f, "unix://{}", unix.path.display()),
        }
    }
}

/// TCP transport configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpTransport {
    /// Hostname or IP address to connect to.
    pub host: String,
    /// TCP port number.
    pub port: u16,
    /// Optional TLS configuration.
    pub tls: Option<TlsOptions>,
}

impl TcpTransport {
    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(|iter| iter.collect())
    }
}

/// Unix domain socket configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixTransport {
    /// Path to the socket file.
    pub path: PathBuf,
}

/// TLS connection options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Open stream to the collector.
pub(crate) enum CollectorStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl CollectorStream {
    /// Bound every later write by `timeout`.
    pub fn set_write_timeout(&self, timeout: Duration) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_write_timeout(Some(timeout)),
            Self::Tls(stream) => stream.get_ref().set_write_timeout(Some(timeout)),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_write_timeout(Some(timeout)),
        }
    }

    /// Flush, send TLS `close_notify` where applicable, then shut down.
    pub fn close(mut self) -> io::Result<()> {
        self.flush()?;
        match &mut self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Both),
            Self::Tls(stream) => {
                stream.shutdown()?;
                stream.get_ref().shutdown(Shutdown::Both)
            }
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Write for CollectorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

impl TcpTransport {
    /// First address that accepts within `timeout`, or the last error seen.
    fn dial(&self, timeout: Duration) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}:{} resolved to no addresses", self.host, self.port),
            )
        }))
    }

    fn open(&self, timeout: Duration) -> io::Result<CollectorStream> {
        let stream = self.dial(timeout)?;
        let Some(tls) = &self.tls else {
            return Ok(CollectorStream::Tcp(stream));
        };
        // The handshake must not outlive the connect timeout.
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let stream = tls
            .connector()?
            .connect(&tls.domain, stream)
            .map_err(io::Error::other)?;
        stream.get_ref().set_read_timeout(None)?;
        Ok(CollectorStream::Tls(Box::new(stream)))
    }
}

impl SocketTransport {
    /// Connect to the collector, bounding TCP connect and TLS handshake by
    /// `timeout`.
    pub(crate) fn open(&self, timeout: Duration) -> io::Result<CollectorStream> {
        match self {
            Self::Tcp(tcp) => tcp.open(timeout),
            #[cfg(unix)]
            Self::Unix(unix) => UnixStream::connect(&unix.path).map(CollectorStream::Unix),
            #[cfg(not(unix))]
            Self::Unix(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix domain sockets are not supported on this platform",
            )),
        }
    }
}
