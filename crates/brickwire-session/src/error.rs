use brickwire_channel::ChannelError;
use brickwire_frame::FrameError;

/// Errors from session control.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `run` was called while a worker is active.
    #[error("a worker program is already running")]
    AlreadyRunning,

    /// The worker thread could not be started.
    #[error("failed to start worker thread: {0}")]
    Spawn(std::io::Error),

    /// Channel-level failure while opening or closing the session.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure returned by a worker program. Logged by the session, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The worker noticed cancellation and stopped early.
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}
