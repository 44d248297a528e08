use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::tcp::TcpTransport;
use crate::traits::{BrickStream, Transport};

/// Where a brick can be reached, parsed from a URL-like string.
///
/// Accepted forms:
/// - `rfcomm://00:16:53:4F:A2:0C` or `rfcomm://00:16:53:4F:A2:0C/2` (channel)
/// - a bare Bluetooth address, treated as `rfcomm://`
/// - `tcp://192.168.1.20:5555`
/// - `unix:///run/ev3-bridge.sock`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Rfcomm { addr: String, channel: u8 },
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    /// Build the transport for this endpoint.
    pub fn transport(&self) -> Result<AnyTransport> {
        let inner = match self {
            #[cfg(target_os = "linux")]
            Endpoint::Rfcomm { addr, channel } => {
                let addr: crate::rfcomm::BdAddr = addr.parse()?;
                AnyTransportInner::Rfcomm(
                    crate::rfcomm::RfcommTransport::new(addr).with_channel(*channel),
                )
            }
            #[cfg(not(target_os = "linux"))]
            Endpoint::Rfcomm { .. } => return Err(TransportError::Unsupported("rfcomm")),
            Endpoint::Tcp(addr) => AnyTransportInner::Tcp(TcpTransport::new(addr.clone())),
            #[cfg(unix)]
            Endpoint::Unix(path) => AnyTransportInner::Unix(crate::uds::UnixTransport::new(path)?),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => return Err(TransportError::Unsupported("unix-domain-socket")),
        };
        Ok(AnyTransport { inner })
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(rest) = s.strip_prefix("tcp://") {
            if rest.is_empty() {
                return Err(invalid("missing host:port"));
            }
            return Ok(Endpoint::Tcp(rest.to_string()));
        }

        if let Some(rest) = s.strip_prefix("unix://") {
            if rest.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(rest)));
        }

        let rest = s.strip_prefix("rfcomm://").unwrap_or(s);
        let (addr, channel) = match rest.split_once('/') {
            Some((addr, channel)) => {
                let channel = channel
                    .parse::<u8>()
                    .ok()
                    .filter(|c| (1..=30).contains(c))
                    .ok_or_else(|| invalid("rfcomm channel must be 1-30"))?;
                (addr, channel)
            }
            None => (rest, 1),
        };
        if addr.split(':').count() != 6 {
            return Err(invalid("expected tcp://, unix:// or a bluetooth address"));
        }

        Ok(Endpoint::Rfcomm {
            addr: addr.to_ascii_uppercase(),
            channel,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Rfcomm { addr, channel } => write!(f, "rfcomm://{addr}/{channel}"),
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A transport chosen at runtime from an [`Endpoint`].
#[derive(Debug)]
pub struct AnyTransport {
    inner: AnyTransportInner,
}

#[derive(Debug)]
enum AnyTransportInner {
    #[cfg(target_os = "linux")]
    Rfcomm(crate::rfcomm::RfcommTransport),
    Tcp(TcpTransport),
    #[cfg(unix)]
    Unix(crate::uds::UnixTransport),
}

impl Transport for AnyTransport {
    type Stream = AnyStream;

    fn connect(&mut self) -> Result<AnyStream> {
        let inner = match &mut self.inner {
            #[cfg(target_os = "linux")]
            AnyTransportInner::Rfcomm(t) => AnyStreamInner::Rfcomm(t.connect()?),
            AnyTransportInner::Tcp(t) => AnyStreamInner::Tcp(t.connect()?),
            #[cfg(unix)]
            AnyTransportInner::Unix(t) => AnyStreamInner::Unix(t.connect()?),
        };
        Ok(AnyStream { inner })
    }

    fn disconnect(&mut self) -> Result<()> {
        match &mut self.inner {
            #[cfg(target_os = "linux")]
            AnyTransportInner::Rfcomm(t) => t.disconnect(),
            AnyTransportInner::Tcp(t) => t.disconnect(),
            #[cfg(unix)]
            AnyTransportInner::Unix(t) => t.disconnect(),
        }
    }

    fn name(&self) -> &'static str {
        match &self.inner {
            #[cfg(target_os = "linux")]
            AnyTransportInner::Rfcomm(t) => t.name(),
            AnyTransportInner::Tcp(t) => t.name(),
            #[cfg(unix)]
            AnyTransportInner::Unix(t) => t.name(),
        }
    }
}

/// A stream produced by [`AnyTransport`].
pub struct AnyStream {
    inner: AnyStreamInner,
}

enum AnyStreamInner {
    #[cfg(target_os = "linux")]
    Rfcomm(crate::rfcomm::RfcommStream),
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl AnyStream {
    /// Wrap an already-connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: AnyStreamInner::Tcp(stream),
        }
    }

    /// Wrap an already-connected Unix stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: AnyStreamInner::Unix(stream),
        }
    }
}

impl Read for AnyStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.read(buf),
            AnyStreamInner::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => s.read(buf),
        }
    }
}

impl Write for AnyStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.write(buf),
            AnyStreamInner::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.flush(),
            AnyStreamInner::Tcp(s) => s.flush(),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => s.flush(),
        }
    }
}

impl BrickStream for AnyStream {
    fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => AnyStreamInner::Rfcomm(s.try_clone()?),
            AnyStreamInner::Tcp(s) => AnyStreamInner::Tcp(BrickStream::try_clone(s)?),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => AnyStreamInner::Unix(BrickStream::try_clone(s)?),
        };
        Ok(Self { inner })
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.set_read_timeout(timeout),
            AnyStreamInner::Tcp(s) => BrickStream::set_read_timeout(s, timeout),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => BrickStream::set_read_timeout(s, timeout),
        }
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.set_write_timeout(timeout),
            AnyStreamInner::Tcp(s) => BrickStream::set_write_timeout(s, timeout),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => BrickStream::set_write_timeout(s, timeout),
        }
    }

    fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(s) => s.shutdown(),
            AnyStreamInner::Tcp(s) => BrickStream::shutdown(s),
            #[cfg(unix)]
            AnyStreamInner::Unix(s) => BrickStream::shutdown(s),
        }
    }
}

impl fmt::Debug for AnyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.inner {
            #[cfg(target_os = "linux")]
            AnyStreamInner::Rfcomm(_) => "rfcomm",
            AnyStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            AnyStreamInner::Unix(_) => "unix",
        };
        f.debug_struct("AnyStream").field("type", &kind).finish()
    }
}
