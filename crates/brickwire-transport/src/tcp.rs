use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{BrickStream, Transport};

/// TCP transport.
///
/// Used for Wi-Fi attached bricks, firmware emulators, and serial-to-TCP
/// bridges that forward the Bluetooth serial profile.
#[derive(Debug)]
pub struct TcpTransport {
    addr: String,
    connect_timeout: Duration,
    active: Option<TcpStream>,
}

impl TcpTransport {
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a transport for `host:port`. Nothing is opened until `connect`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            active: None,
        }
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// The configured address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn open(&self) -> Result<TcpStream> {
        let addrs = self
            .addr
            .to_socket_addrs()
            .map_err(|_| TransportError::InvalidAddress(self.addr.clone()))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "tcp connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            target: self.addr.clone(),
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
            }),
        })
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn connect(&mut self) -> Result<TcpStream> {
        let stream = self.open()?;
        self.active = Some(BrickStream::try_clone(&stream)?);
        info!(addr = %self.addr, "connected over tcp");
        Ok(stream)
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.active.take() {
            Some(stream) => {
                debug!(addr = %self.addr, "disconnecting tcp transport");
                BrickStream::shutdown(&stream)
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
