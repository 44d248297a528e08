use std::io::{ErrorKind, Read};

use brickwire_transport::BrickStream;
use bytes::Bytes;

use crate::codec::{decode_command, decode_reply, Command, FrameConfig, Reply, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally: callers always get complete bodies.
/// With a read timeout configured on the stream, [`poll_body`](Self::poll_body)
/// distinguishes an idle line (nothing arrived) from a frame that stalled
/// half-way through.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next frame body if one starts before the read timeout.
    ///
    /// Returns `Ok(None)` when the timeout elapses before the first byte of
    /// the length prefix arrives. A timeout after that point is an error.
    pub fn poll_body(&mut self) -> Result<Option<Bytes>> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        if !self.fill(&mut prefix, true)? {
            return Ok(None);
        }

        let len = u16::from_le_bytes(prefix) as usize;
        if len > self.config.max_body_size {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.config.max_body_size,
            });
        }

        let mut body = vec![0u8; len];
        // A timeout or error in here leaves the rest of this body in the
        // stream; the next poll then reads it as a length prefix. There is no
        // resync marker in the wire format.
        self.fill(&mut body, false)?;
        Ok(Some(Bytes::from(body)))
    }

    /// Read the next complete frame body (blocking through idle timeouts).
    pub fn read_body(&mut self) -> Result<Bytes> {
        loop {
            if let Some(body) = self.poll_body()? {
                return Ok(body);
            }
        }
    }

    /// Poll for the next reply frame.
    pub fn poll_reply(&mut self) -> Result<Option<Reply>> {
        self.poll_body()?.map(decode_reply).transpose()
    }

    /// Read the next reply frame (blocking).
    pub fn read_reply(&mut self) -> Result<Reply> {
        decode_reply(self.read_body()?)
    }

    /// Read the next command frame (blocking). Used on the device side by emulators.
    pub fn read_command(&mut self) -> Result<Command> {
        decode_command(self.read_body()?)
    }

    /// Fill `buf` completely. Returns `Ok(false)` only if `idle_ok` is set and
    /// the read timed out before any byte arrived.
    fn fill(&mut self, buf: &mut [u8], idle_ok: bool) -> Result<bool> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if idle_ok && filled == 0 && is_timeout(&err) => return Ok(false),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(true)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<S: BrickStream> FrameReader<S> {
    /// Create a frame reader for a brick stream and apply the read timeout from config.
    pub fn with_config_stream(inner: S, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Socket read timeouts surface as `WouldBlock` on Unix and `TimedOut` on Windows.
pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub(crate) fn transport_to_frame_error(err: brickwire_transport::TransportError) -> FrameError {
    match err {
        brickwire_transport::TransportError::Io(io) => FrameError::Io(io),
        brickwire_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
