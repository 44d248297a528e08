use std::time::Duration;

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] brickwire_transport::TransportError),

    /// Frame-level error, including reservation violations and device-reported failures.
    #[error("frame error: {0}")]
    Frame(#[from] brickwire_frame::FrameError),

    /// No reply arrived within the wait timeout. The command may still complete.
    #[error("no reply within {0:?}")]
    Timeout(Duration),

    /// The channel was closed by its owner.
    #[error("channel closed")]
    Closed,

    /// The spooler gave up after repeated read failures.
    #[error("channel terminated: {0}")]
    Terminated(String),

    /// Every sequence counter is taken by an in-flight command.
    #[error("all 65536 sequence counters are in flight")]
    CountersExhausted,

    /// The spooler thread could not be started.
    #[error("failed to start spooler thread: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
