//! Exclusive access to a brick for one worker program at a time.
//!
//! A [`DeviceSession`] wraps a [`Channel`](brickwire_channel::Channel) and runs
//! at most one worker. The worker receives a [`Brick`], the typed capability
//! object for batteries, sensors, motors and sound, and polls
//! [`Brick::is_cancelled`] to stop cooperatively.

pub mod brick;
pub mod error;
pub mod motor;
pub mod sensor;
pub mod session;

pub use brick::Brick;
pub use error::{Result, SessionError, WorkerError};
pub use motor::{Motor, Polarity};
pub use sensor::Sensor;
pub use session::DeviceSession;

#[cfg(all(test, unix))]
pub(crate) mod fake;
