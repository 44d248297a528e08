//! Client-side protocol engine for LEGO Mindstorms EV3-class bricks.
//!
//! brickwire turns device operations into direct-command frames, multiplexes
//! many in-flight commands over one byte stream, and lets exactly one worker
//! program drive the brick at a time.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte streams to the brick (Bluetooth RFCOMM, TCP, Unix sockets)
//! - [`frame`]: wire format, bytecode builder and firmware constants
//! - [`channel`]: concurrent command channel with reply correlation
//! - [`session`]: single-worker session and typed capabilities

/// Re-export transport types.
pub mod transport {
    pub use brickwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use brickwire_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use brickwire_channel::*;
}

/// Re-export session types.
pub mod session {
    pub use brickwire_session::*;
}
