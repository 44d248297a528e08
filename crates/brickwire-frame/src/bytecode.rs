use bytes::{BufMut, Bytes, BytesMut};

use crate::firmware::tag;

/// Parameter tag values plugged into the bytecode builder.
///
/// The builder fixes the layout (tag byte, then a little-endian value of the
/// tagged width); which literal tag values are used comes from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamTags {
    pub one_byte: u8,
    pub two_bytes: u8,
    pub four_bytes: u8,
    pub global_one_byte: u8,
    pub global_two_bytes: u8,
}

impl ParamTags {
    /// Tags from the EV3 firmware reference.
    pub const EV3: ParamTags = ParamTags {
        one_byte: tag::LC1,
        two_bytes: tag::LC2,
        four_bytes: tag::LC4,
        global_one_byte: tag::GV1,
        global_two_bytes: tag::GV2,
    };
}

impl Default for ParamTags {
    fn default() -> Self {
        Self::EV3
    }
}

/// Declared width of a constant parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamWidth {
    One,
    Two,
    Four,
}

impl ParamWidth {
    /// Number of value bytes following the tag.
    pub fn value_len(self) -> usize {
        match self {
            ParamWidth::One => 1,
            ParamWidth::Two => 2,
            ParamWidth::Four => 4,
        }
    }
}

/// A finished, immutable bytecode sequence ready to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytecode(Bytes);

impl Bytecode {
    /// An empty bytecode. Valid on the wire, but does nothing on the device.
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Wrap bytes that are already valid bytecode, such as a captured command body.
    pub fn from_raw(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

impl AsRef<[u8]> for Bytecode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytecode> for Bytes {
    fn from(code: Bytecode) -> Self {
        code.0
    }
}

/// Appends opcodes and tagged parameters into a bytecode buffer.
///
/// ```
/// use brickwire_frame::{firmware, BytecodeBuilder};
///
/// let code = BytecodeBuilder::new()
///     .op(firmware::op::UI_READ)
///     .param_u8(firmware::ui_read::GET_VBATT)
///     .global_index(0)
///     .build();
/// assert_eq!(code.as_ref(), &[0x81, 0x81, 0x01, 0xE1, 0x00]);
/// ```
#[derive(Debug, Clone)]
pub struct BytecodeBuilder {
    buf: BytesMut,
    tags: ParamTags,
}

impl BytecodeBuilder {
    /// Create a builder using the EV3 tag table.
    pub fn new() -> Self {
        Self::with_tags(ParamTags::EV3)
    }

    /// Create a builder with an explicit tag table.
    pub fn with_tags(tags: ParamTags) -> Self {
        Self {
            buf: BytesMut::with_capacity(32),
            tags,
        }
    }

    /// Append an opcode (or sub-command selector) byte.
    pub fn op(mut self, opcode: u8) -> Self {
        self.buf.put_u8(opcode);
        self
    }

    /// Append a tagged constant of the given width. `value` is truncated to the width.
    pub fn param(mut self, width: ParamWidth, value: i32) -> Self {
        match width {
            ParamWidth::One => {
                self.buf.put_u8(self.tags.one_byte);
                self.buf.put_u8(value as u8);
            }
            ParamWidth::Two => {
                self.buf.put_u8(self.tags.two_bytes);
                self.buf.put_u16_le(value as u16);
            }
            ParamWidth::Four => {
                self.buf.put_u8(self.tags.four_bytes);
                self.buf.put_i32_le(value);
            }
        }
        self
    }

    pub fn param_u8(self, value: u8) -> Self {
        self.param(ParamWidth::One, i32::from(value))
    }

    pub fn param_i8(self, value: i8) -> Self {
        self.param(ParamWidth::One, i32::from(value))
    }

    pub fn param_u16(self, value: u16) -> Self {
        self.param(ParamWidth::Two, i32::from(value))
    }

    pub fn param_i16(self, value: i16) -> Self {
        self.param(ParamWidth::Two, i32::from(value))
    }

    pub fn param_i32(self, value: i32) -> Self {
        self.param(ParamWidth::Four, value)
    }

    /// Append a reference to an offset in the command's global reservation.
    ///
    /// Offsets below 256 use the one-byte form, larger ones the two-byte form.
    pub fn global_index(mut self, offset: u16) -> Self {
        if let Ok(short) = u8::try_from(offset) {
            self.buf.put_u8(self.tags.global_one_byte);
            self.buf.put_u8(short);
        } else {
            self.buf.put_u8(self.tags.global_two_bytes);
            self.buf.put_u16_le(offset);
        }
        self
    }

    /// Append a finished bytecode after what has been built so far.
    pub fn append(mut self, other: &Bytecode) -> Self {
        self.buf.extend_from_slice(other.as_ref());
        self
    }

    /// Bytes appended so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Freeze into an immutable [`Bytecode`].
    pub fn build(self) -> Bytecode {
        Bytecode(self.buf.freeze())
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::op;

    #[test]
    fn one_byte_parameter_is_tagged() {
        let code = BytecodeBuilder::new().op(0x01).param_u8(5).build();
        assert_eq!(code.as_ref(), &[0x01, tag::LC1, 0x05]);
        assert_eq!(code.len(), 3);
    }

    #[test]
    fn wider_parameters_are_little_endian() {
        let code = BytecodeBuilder::new()
            .param_u16(0x1234)
            .param_i32(-2)
            .build();
        assert_eq!(
            code.as_ref(),
            &[tag::LC2, 0x34, 0x12, tag::LC4, 0xFE, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn negative_byte_parameter() {
        let code = BytecodeBuilder::new().param_i8(-50).build();
        assert_eq!(code.as_ref(), &[tag::LC1, 0xCE]);
    }

    #[test]
    fn global_index_picks_width() {
        let code = BytecodeBuilder::new()
            .global_index(4)
            .global_index(300)
            .build();
        assert_eq!(code.as_ref(), &[tag::GV1, 4, tag::GV2, 0x2C, 0x01]);
    }

    #[test]
    fn append_concatenates_in_order() {
        let power = BytecodeBuilder::new()
            .op(op::OUTPUT_POWER)
            .param_u8(0)
            .param_u8(1)
            .param_i8(40)
            .build();
        let start = BytecodeBuilder::new()
            .op(op::OUTPUT_START)
            .param_u8(0)
            .param_u8(1)
            .build();

        let both = BytecodeBuilder::new().append(&power).append(&start).build();
        assert_eq!(both.len(), power.len() + start.len());
        assert_eq!(&both.as_ref()[..power.len()], power.as_ref());
        assert_eq!(&both.as_ref()[power.len()..], start.as_ref());
    }

    #[test]
    fn custom_tags_change_only_tag_bytes() {
        let tags = ParamTags {
            one_byte: 0x10,
            global_one_byte: 0x20,
            ..ParamTags::EV3
        };
        let code = BytecodeBuilder::with_tags(tags)
            .op(0x01)
            .param_u8(7)
            .global_index(0)
            .build();
        assert_eq!(code.as_ref(), &[0x01, 0x10, 7, 0x20, 0]);
    }

    #[test]
    fn empty_builder_is_valid() {
        let builder = BytecodeBuilder::new();
        assert!(builder.is_empty());
        assert!(builder.build().is_empty());
        assert!(Bytecode::empty().is_empty());
    }
}
