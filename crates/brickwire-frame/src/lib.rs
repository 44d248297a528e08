//! Wire format for EV3-class direct commands.
//!
//! Every frame, in both directions, is a 2-byte little-endian length prefix
//! followed by a body:
//! - command body: counter (2B LE), command type, reservation low, reservation high, bytecode
//! - reply body: counter (2B LE), status, payload
//!
//! The bytecode carried by a command is built with [`BytecodeBuilder`], which
//! emits opcodes and width-tagged parameters as listed in [`firmware`].

#[cfg(feature = "async")]
pub mod async_codec;
pub mod bytecode;
pub mod codec;
pub mod error;
pub mod firmware;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::BrickCodec;
pub use bytecode::{Bytecode, BytecodeBuilder, ParamTags, ParamWidth};
pub use codec::{
    decode_command, decode_reply, encode_command, encode_reply, Command, FrameConfig, Reply,
    Reservation, COMMAND_HEADER_SIZE, DEFAULT_MAX_BODY, LENGTH_PREFIX_SIZE, MAX_GLOBAL_RESERVATION,
    MAX_LOCAL_RESERVATION, REPLY_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
