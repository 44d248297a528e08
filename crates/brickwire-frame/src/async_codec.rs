//! `tokio_util` codec for hosts that drive the brick from an async runtime.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_reply, encode_command, Command, Reply, DEFAULT_MAX_BODY, LENGTH_PREFIX_SIZE};
use crate::error::FrameError;

/// Decodes reply frames and encodes command frames.
#[derive(Debug, Clone)]
pub struct BrickCodec {
    max_body_size: usize,
}

impl BrickCodec {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY)
    }

    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self { max_body_size }
    }
}

impl Default for BrickCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BrickCodec {
    type Item = Reply;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Reply>, FrameError> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let len = u16::from_le_bytes([src[0], src[1]]) as usize;
        if len > self.max_body_size {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.max_body_size,
            });
        }

        if src.len() < LENGTH_PREFIX_SIZE + len {
            src.reserve(LENGTH_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        decode_reply(src.split_to(len).freeze()).map(Some)
    }
}

impl Encoder<Command> for BrickCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_command(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::bytecode::BytecodeBuilder;
    use crate::codec::encode_reply;
    use crate::firmware::reply_status;

    #[tokio::test]
    async fn decodes_replies_from_stream() {
        let (mut device, host) = tokio::io::duplex(256);
        let mut wire = BytesMut::new();
        encode_reply(&Reply::new(1, reply_status::DIRECT_OK, vec![9u8]), &mut wire).unwrap();
        encode_reply(&Reply::new(2, reply_status::DIRECT_ERROR, Vec::new()), &mut wire).unwrap();
        device.write_all(&wire).await.unwrap();
        drop(device);

        let mut framed = FramedRead::new(host, BrickCodec::new());
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();

        assert_eq!(first.counter(), 1);
        assert_eq!(first.payload().as_ref(), &[9]);
        assert!(second.is_error());
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn encodes_commands_to_stream() {
        let (host, mut device) = tokio::io::duplex(256);
        let mut framed = FramedWrite::new(host, BrickCodec::new());
        let cmd = Command::new(3, false, 0, 0, BytecodeBuilder::new().op(0x01).param_u8(5).build())
            .unwrap();
        framed.send(cmd.clone()).await.unwrap();

        let mut buf = vec![0u8; cmd.wire_size()];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, cmd.encode().unwrap().to_vec());
    }

    #[test]
    fn partial_frame_waits_for_more() {
        let mut codec = BrickCodec::new();
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x01][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn oversized_length_rejected() {
        let mut codec = BrickCodec::with_max_body_size(8);
        let mut buf = BytesMut::from(&[0x40, 0x00][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::FrameTooLarge { size: 64, max: 8 })
        ));
    }
}
