use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{BrickStream, Transport};

/// Unix domain socket transport.
///
/// Connects to a local bridge process that forwards the brick's serial
/// profile (for example an `rfcomm` or USB HID relay) over a socket path.
#[derive(Debug)]
pub struct UnixTransport {
    path: PathBuf,
    active: Option<UnixStream>,
}

impl UnixTransport {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Create a transport for a socket path. Nothing is opened until `connect`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        Ok(Self { path, active: None })
    }

    /// The socket path this transport connects to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for UnixTransport {
    type Stream = UnixStream;

    fn connect(&mut self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.path).map_err(|e| TransportError::Connect {
            target: self.path.display().to_string(),
            source: e,
        })?;
        self.active = Some(BrickStream::try_clone(&stream)?);
        info!(path = ?self.path, "connected over unix domain socket");
        Ok(stream)
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.active.take() {
            Some(stream) => {
                debug!(path = ?self.path, "disconnecting unix transport");
                BrickStream::shutdown(&stream)
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "unix-domain-socket"
    }
}
