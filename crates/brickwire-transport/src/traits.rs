use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected, bidirectional byte stream to a brick.
///
/// The channel layer clones the stream once: one handle is owned by the
/// background reader, the other sits behind the write lock. Timeouts apply to
/// the underlying socket, so they affect every clone.
pub trait BrickStream: Read + Write + Send + Sized + 'static {
    /// Create a second handle to the same connection.
    fn try_clone(&self) -> Result<Self>;

    /// Set the read timeout. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Set the write timeout. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Shut down both directions, waking any blocked reader.
    fn shutdown(&self) -> Result<()>;
}

/// Something that can open a [`BrickStream`] to a device.
///
/// Implementations are supplied by the embedding application; brickwire ships
/// RFCOMM, TCP and Unix socket variants.
pub trait Transport {
    /// The stream type produced by [`connect`](Transport::connect).
    type Stream: BrickStream;

    /// Open a connection to the device.
    fn connect(&mut self) -> Result<Self::Stream>;

    /// Tear down the connection opened by the last `connect`, if any.
    fn disconnect(&mut self) -> Result<()>;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str;
}

impl BrickStream for TcpStream {
    fn try_clone(&self) -> Result<Self> {
        Ok(TcpStream::try_clone(self)?)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(TcpStream::set_read_timeout(self, timeout)?)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(TcpStream::set_write_timeout(self, timeout)?)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(TcpStream::shutdown(self, Shutdown::Both))
    }
}

#[cfg(unix)]
impl BrickStream for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> Result<Self> {
        Ok(std::os::unix::net::UnixStream::try_clone(self)?)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(std::os::unix::net::UnixStream::set_read_timeout(
            self, timeout,
        )?)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(std::os::unix::net::UnixStream::set_write_timeout(
            self, timeout,
        )?)
    }

    fn shutdown(&self) -> Result<()> {
        ignore_not_connected(std::os::unix::net::UnixStream::shutdown(
            self,
            Shutdown::Both,
        ))
    }
}

/// Shutting down an already-closed socket is not an error for our purposes.
pub(crate) fn ignore_not_connected(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn clone_shares_connection() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut clone = BrickStream::try_clone(&left).unwrap();

        clone.write_all(b"ev3").unwrap();
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ev3");
    }

    #[test]
    fn read_timeout_applies() {
        let (mut left, _right) = UnixStream::pair().unwrap();
        BrickStream::set_read_timeout(&left, Some(Duration::from_millis(10))).unwrap();

        let mut buf = [0u8; 1];
        let err = left.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn shutdown_wakes_reader_with_eof() {
        let (mut left, _right) = UnixStream::pair().unwrap();
        let closer = BrickStream::try_clone(&left).unwrap();
        BrickStream::shutdown(&closer).unwrap();

        let mut buf = [0u8; 1];
        assert_eq!(left.read(&mut buf).unwrap(), 0);
        // A second shutdown is harmless.
        BrickStream::shutdown(&closer).unwrap();
    }
}
