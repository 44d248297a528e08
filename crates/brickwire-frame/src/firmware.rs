//! Constant table from the EV3 firmware direct-command reference.
//!
//! This module is the single source of truth for literal byte values. The
//! codec and bytecode builder only fix the *shape* of frames and parameters;
//! the values plugged into that shape come from here.

/// Command type byte (third byte of a command body).
pub mod command_type {
    /// Direct command, reply required.
    pub const DIRECT_REPLY: u8 = 0x00;
    /// Direct command, no reply.
    pub const DIRECT_NO_REPLY: u8 = 0x80;
    /// System command, reply required.
    pub const SYSTEM_REPLY: u8 = 0x01;
    /// System command, no reply.
    pub const SYSTEM_NO_REPLY: u8 = 0x81;
}

/// Reply status byte (third byte of a reply body).
pub mod reply_status {
    /// Direct command succeeded. This is the success sentinel.
    pub const DIRECT_OK: u8 = 0x02;
    /// Direct command failed.
    pub const DIRECT_ERROR: u8 = 0x04;
    /// System command succeeded.
    pub const SYSTEM_OK: u8 = 0x03;
    /// System command failed.
    pub const SYSTEM_ERROR: u8 = 0x05;
}

/// Parameter tag bytes.
pub mod tag {
    /// Local constant, 1 byte follows.
    pub const LC1: u8 = 0x81;
    /// Local constant, 2 bytes follow (LE).
    pub const LC2: u8 = 0x82;
    /// Local constant, 4 bytes follow (LE).
    pub const LC4: u8 = 0x83;
    /// Global variable index, 1 byte follows.
    pub const GV1: u8 = 0xE1;
    /// Global variable index, 2 bytes follow (LE).
    pub const GV2: u8 = 0xE2;
}

/// Opcodes.
pub mod op {
    pub const UI_READ: u8 = 0x81;
    pub const SOUND: u8 = 0x94;
    pub const SOUND_READY: u8 = 0x96;
    pub const INPUT_DEVICE: u8 = 0x99;
    pub const OUTPUT_RESET: u8 = 0xA2;
    pub const OUTPUT_STOP: u8 = 0xA3;
    pub const OUTPUT_POWER: u8 = 0xA4;
    pub const OUTPUT_SPEED: u8 = 0xA5;
    pub const OUTPUT_START: u8 = 0xA6;
    pub const OUTPUT_POLARITY: u8 = 0xA7;
    pub const OUTPUT_CLR_COUNT: u8 = 0xB2;
    pub const OUTPUT_GET_COUNT: u8 = 0xB3;
}

/// `opUI_READ` sub-commands.
pub mod ui_read {
    /// Battery voltage in volts (float).
    pub const GET_VBATT: u8 = 0x01;
    /// Battery current in amperes (float).
    pub const GET_IBATT: u8 = 0x02;
    /// Battery level in percent (1 byte).
    pub const GET_LBATT: u8 = 0x12;
}

/// `opSOUND` sub-commands.
pub mod sound {
    pub const BREAK: u8 = 0x00;
    pub const TONE: u8 = 0x01;
}

/// `opINPUT_DEVICE` sub-commands.
pub mod input_device {
    pub const GET_TYPEMODE: u8 = 0x05;
    pub const READY_PCT: u8 = 0x1B;
    pub const READY_RAW: u8 = 0x1C;
    pub const READY_SI: u8 = 0x1D;
}

/// Daisy-chain layer of the brick the host is connected to.
pub const LAYER_MASTER: u8 = 0x00;

/// Sensor type value meaning "keep whatever type is detected".
pub const TYPE_KEEP: u8 = 0x00;

/// Output port bit masks.
pub mod output_port {
    pub const A: u8 = 0x01;
    pub const B: u8 = 0x02;
    pub const C: u8 = 0x04;
    pub const D: u8 = 0x08;
    pub const ALL: u8 = 0x0F;
}

/// Number of sensor input ports per layer.
pub const INPUT_PORTS: u8 = 4;
