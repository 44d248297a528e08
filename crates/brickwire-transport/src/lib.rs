//! Byte-stream transports for talking to an EV3-class brick.
//!
//! The protocol engine only needs a reliable, ordered, bidirectional byte
//! stream. This crate provides that stream over:
//! - Bluetooth RFCOMM (Linux)
//! - TCP (Wi-Fi dongles, emulators, serial-to-TCP bridges)
//! - Unix domain sockets (local serial bridges)
//!
//! This is the lowest layer of brickwire. Everything else builds on top of
//! the [`BrickStream`] and [`Transport`] traits provided here.

pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod rfcomm;
#[cfg(unix)]
pub mod uds;

pub use endpoint::{AnyStream, Endpoint};
pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
pub use traits::{BrickStream, Transport};

#[cfg(target_os = "linux")]
pub use rfcomm::{BdAddr, RfcommStream, RfcommTransport};
#[cfg(unix)]
pub use uds::UnixTransport;
