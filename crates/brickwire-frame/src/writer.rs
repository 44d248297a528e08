use std::io::{ErrorKind, Write};

use brickwire_transport::BrickStream;
use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_command, encode_reply, Command, FrameConfig, Reply};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a command (blocking).
    pub fn write_command(&mut self, command: &Command) -> Result<()> {
        self.buf.clear();
        encode_command(command, &mut self.buf)?;
        trace!(
            counter = command.counter(),
            bytes = self.buf.len(),
            "writing command frame"
        );
        self.write_buffered()
    }

    /// Encode and send a reply (blocking). Used on the device side by emulators.
    pub fn write_reply(&mut self, reply: &Reply) -> Result<()> {
        self.buf.clear();
        encode_reply(reply, &mut self.buf)?;
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<S: BrickStream> FrameWriter<S> {
    /// Create a frame writer for a brick stream and apply the write timeout from config.
    pub fn with_config_stream(inner: S, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::{Buf, BytesMut};

    use super::*;
    use crate::bytecode::BytecodeBuilder;
    use crate::codec::{decode_command, decode_reply, LENGTH_PREFIX_SIZE};
    use crate::firmware::reply_status;

    fn command(counter: u16) -> Command {
        Command::new(
            counter,
            false,
            0,
            0,
            BytecodeBuilder::new().op(0x01).param_u8(5).build(),
        )
        .unwrap()
    }

    fn split_bodies(mut wire: BytesMut) -> Vec<bytes::Bytes> {
        let mut bodies = Vec::new();
        while wire.len() >= LENGTH_PREFIX_SIZE {
            let len = wire.get_u16_le() as usize;
            bodies.push(wire.split_to(len).freeze());
        }
        bodies
    }

    #[test]
    fn write_single_command() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_command(&command(3)).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), 10);
        let bodies = split_bodies(BytesMut::from(wire.as_slice()));
        assert_eq!(decode_command(bodies[0].clone()).unwrap(), command(3));
    }

    #[test]
    fn write_multiple_commands_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        for counter in [10, 11, 12] {
            writer.write_command(&command(counter)).unwrap();
        }

        let wire = writer.into_inner().into_inner();
        let counters: Vec<u16> = split_bodies(BytesMut::from(wire.as_slice()))
            .into_iter()
            .map(|body| decode_command(body).unwrap().counter())
            .collect();
        assert_eq!(counters, vec![10, 11, 12]);
    }

    #[test]
    fn write_reply_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let reply = Reply::new(5, reply_status::DIRECT_OK, vec![1, 2, 3, 4]);
        writer.write_reply(&reply).unwrap();

        let wire = writer.into_inner().into_inner();
        let bodies = split_bodies(BytesMut::from(wire.as_slice()));
        assert_eq!(decode_reply(bodies[0].clone()).unwrap(), reply);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.write_command(&command(1)).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_command(&command(1)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_write_retries() {
        let mut writer = FrameWriter::new(InterruptOnce {
            interrupted: false,
            data: Vec::new(),
        });
        writer.write_command(&command(2)).unwrap();
        assert_eq!(writer.get_ref().data.len(), 10);
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
