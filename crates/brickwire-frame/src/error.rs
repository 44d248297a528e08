/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A command asked for more device memory than the firmware allows.
    #[error("reservation exceeded (local {local} of max 64, global {global} of max 1024)")]
    ReservationExceeded { local: u16, global: u16 },

    /// A frame body or payload is shorter than the data requested from it.
    #[error("truncated frame (needed {needed} bytes, got {available})")]
    Truncated { needed: usize, available: usize },

    /// The length prefix exceeds the configured maximum body size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The brick answered with its error status.
    #[error("device reported failure for command {counter} (status {status:#04x})")]
    DeviceError { counter: u16, status: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
