use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::bytecode::Bytecode;
use crate::error::{FrameError, Result};
use crate::firmware::{command_type, reply_status};

/// Length prefix preceding every frame body.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Command header: counter (2) + type (1) + reservation (2) = 5 bytes.
pub const COMMAND_HEADER_SIZE: usize = 5;

/// Reply header: counter (2) + status (1) = 3 bytes.
pub const REPLY_HEADER_SIZE: usize = 3;

/// Maximum device-local scratch memory per command, in bytes.
pub const MAX_LOCAL_RESERVATION: u16 = 64;

/// Maximum device-global scratch memory per command, in bytes.
pub const MAX_GLOBAL_RESERVATION: u16 = 1024;

/// Default upper bound for a received frame body: reply header + full global reservation.
pub const DEFAULT_MAX_BODY: usize = REPLY_HEADER_SIZE + MAX_GLOBAL_RESERVATION as usize;

/// Device scratch memory requested by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reservation {
    local: u16,
    global: u16,
}

impl Reservation {
    /// No scratch memory.
    pub const NONE: Reservation = Reservation {
        local: 0,
        global: 0,
    };

    /// Validate and create a reservation.
    ///
    /// The upper bounds themselves are accepted, but the header only carries
    /// 6 bits of local size and 10 bits of global size: `local == 64` and
    /// `global == 1024` both encode as zero, so the brick reserves nothing
    /// for them. Use at most 63 local and 1023 global bytes for real work.
    pub fn new(local: u16, global: u16) -> Result<Self> {
        if local > MAX_LOCAL_RESERVATION || global > MAX_GLOBAL_RESERVATION {
            return Err(FrameError::ReservationExceeded { local, global });
        }
        Ok(Self { local, global })
    }

    /// Only global memory, for commands whose result is returned in the reply.
    pub fn global(global: u16) -> Result<Self> {
        Self::new(0, global)
    }

    /// Whether either size sits on its upper bound, where the header encoding wraps to zero.
    pub fn wraps_on_wire(&self) -> bool {
        self.local == MAX_LOCAL_RESERVATION || self.global == MAX_GLOBAL_RESERVATION
    }

    pub fn local_bytes(&self) -> u16 {
        self.local
    }

    pub fn global_bytes(&self) -> u16 {
        self.global
    }

    /// First reservation byte: low 8 bits of the global size.
    ///
    /// A global size of 1024 wraps to `0x00` here and in [`high_byte`](Self::high_byte).
    pub fn low_byte(&self) -> u8 {
        (self.global & 0xFF) as u8
    }

    /// Second reservation byte: local size in bits 2..8, global bits 8..10 in bits 0..2.
    ///
    /// A local size of 64 shifts out of the byte and encodes as zero.
    pub fn high_byte(&self) -> u8 {
        (((self.local << 2) & 0b1111_1100) | ((self.global >> 8) & 0b11)) as u8
    }

    fn from_wire(low: u8, high: u8) -> Self {
        Self {
            local: u16::from(high >> 2),
            global: (u16::from(high & 0b11) << 8) | u16::from(low),
        }
    }
}

/// A direct command ready to be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    counter: u16,
    expects_reply: bool,
    reservation: Reservation,
    bytecode: Bytecode,
}

impl Command {
    /// Create a command. Fails if either reservation exceeds the firmware bounds.
    pub fn new(
        counter: u16,
        expects_reply: bool,
        local: u16,
        global: u16,
        bytecode: Bytecode,
    ) -> Result<Self> {
        Ok(Self::with_reservation(
            counter,
            expects_reply,
            Reservation::new(local, global)?,
            bytecode,
        ))
    }

    /// Create a command from an already validated reservation.
    pub fn with_reservation(
        counter: u16,
        expects_reply: bool,
        reservation: Reservation,
        bytecode: Bytecode,
    ) -> Self {
        Self {
            counter,
            expects_reply,
            reservation,
            bytecode,
        }
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn expects_reply(&self) -> bool {
        self.expects_reply
    }

    pub fn reservation(&self) -> Reservation {
        self.reservation
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    /// Size of the body (everything after the length prefix).
    pub fn body_size(&self) -> usize {
        COMMAND_HEADER_SIZE + self.bytecode.len()
    }

    /// Total wire size including the length prefix.
    pub fn wire_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body_size()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_command(self, &mut buf)?;
        Ok(buf.freeze())
    }
}

/// A reply received from the brick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    counter: u16,
    status: u8,
    payload: Bytes,
}

impl Reply {
    pub fn new(counter: u16, status: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            counter,
            status,
            payload: payload.into(),
        }
    }

    /// Counter of the command this reply answers.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Raw status byte.
    pub fn status(&self) -> u8 {
        self.status
    }

    /// True when the brick reported failure. The payload is still available.
    pub fn is_error(&self) -> bool {
        self.status != reply_status::DIRECT_OK
    }

    /// Global memory contents copied back by the brick.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Turn the error flag into a [`FrameError::DeviceError`].
    pub fn into_result(self) -> Result<Reply> {
        if self.is_error() {
            return Err(FrameError::DeviceError {
                counter: self.counter,
                status: self.status,
            });
        }
        Ok(self)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let truncated = |needed| FrameError::Truncated {
            needed,
            available: self.payload.len(),
        };
        let end = offset.checked_add(len).ok_or(truncated(usize::MAX))?;
        self.payload.get(offset..end).ok_or(truncated(end))
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        Ok(self.slice(offset, 2)?.get_i16_le())
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        Ok(self.slice(offset, 4)?.get_i32_le())
    }

    pub fn read_f32(&self, offset: usize) -> Result<f32> {
        Ok(self.slice(offset, 4)?.get_f32_le())
    }

    /// Read `count` consecutive little-endian floats starting at `offset`.
    pub fn read_f32s(&self, offset: usize, count: usize) -> Result<Vec<f32>> {
        let len = count.checked_mul(4).ok_or(FrameError::Truncated {
            needed: usize::MAX,
            available: self.payload.len(),
        })?;
        let mut raw = self.slice(offset, len)?;
        Ok((0..count).map(|_| raw.get_f32_le()).collect())
    }
}

/// Encode a command into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬────────────┬──────┬─────────┬──────────┬──────────────┐
/// │ Length     │ Counter    │ Type │ Res.low │ Res.high │ Bytecode     │
/// │ (2B LE)    │ (2B LE)    │ (1B) │ (1B)    │ (1B)     │ (Length - 5) │
/// └────────────┴────────────┴──────┴─────────┴──────────┴──────────────┘
/// ```
pub fn encode_command(command: &Command, dst: &mut BytesMut) -> Result<()> {
    let body = command.body_size();
    if body > u16::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: body,
            max: u16::MAX as usize,
        });
    }

    let kind = if command.expects_reply {
        command_type::DIRECT_REPLY
    } else {
        command_type::DIRECT_NO_REPLY
    };

    dst.reserve(LENGTH_PREFIX_SIZE + body);
    dst.put_u16_le(body as u16);
    dst.put_u16_le(command.counter);
    dst.put_u8(kind);
    dst.put_u8(command.reservation.low_byte());
    dst.put_u8(command.reservation.high_byte());
    dst.put_slice(command.bytecode.as_ref());
    Ok(())
}

/// Decode a reply body (length prefix already stripped).
pub fn decode_reply(mut body: Bytes) -> Result<Reply> {
    if body.len() < REPLY_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: REPLY_HEADER_SIZE,
            available: body.len(),
        });
    }

    let counter = body.get_u16_le();
    let status = body.get_u8();
    Ok(Reply {
        counter,
        status,
        payload: body,
    })
}

/// Encode a reply into the wire format. Used by emulators and test doubles.
pub fn encode_reply(reply: &Reply, dst: &mut BytesMut) -> Result<()> {
    let body = REPLY_HEADER_SIZE + reply.payload.len();
    if body > u16::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: body,
            max: u16::MAX as usize,
        });
    }

    dst.reserve(LENGTH_PREFIX_SIZE + body);
    dst.put_u16_le(body as u16);
    dst.put_u16_le(reply.counter);
    dst.put_u8(reply.status);
    dst.put_slice(&reply.payload);
    Ok(())
}

/// Decode a command body (length prefix already stripped).
///
/// A global reservation of exactly 1024 bytes does not survive the 10-bit
/// wire field and decodes as 0.
pub fn decode_command(mut body: Bytes) -> Result<Command> {
    if body.len() < COMMAND_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: COMMAND_HEADER_SIZE,
            available: body.len(),
        });
    }

    let counter = body.get_u16_le();
    let kind = body.get_u8();
    let low = body.get_u8();
    let high = body.get_u8();
    Ok(Command {
        counter,
        expects_reply: kind & command_type::DIRECT_NO_REPLY == 0,
        reservation: Reservation::from_wire(low, high),
        bytecode: Bytecode::from_raw(body),
    })
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted body size in bytes. Default: reply header + 1024.
    pub max_body_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
