//! Asynchronous command channel for EV3-class bricks.
//!
//! Many threads may issue commands at once over a single connection. Each
//! reply-expecting command gets a [`ReplyHandle`]; a background spooler reads
//! reply frames and resolves the handle whose sequence counter matches,
//! whatever order the brick answers in.

pub mod channel;
pub mod config;
pub mod error;
mod pending;
pub mod promise;
pub mod spooler;

pub use channel::Channel;
pub use config::ChannelConfig;
pub use error::{ChannelError, Result};
pub use promise::{OneShot, ReplyHandle};
pub use spooler::{FailureKind, RetryBudget};
