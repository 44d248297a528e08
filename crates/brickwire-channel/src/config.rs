use std::time::Duration;

use brickwire_frame::FrameConfig;

/// Configuration for a [`Channel`](crate::Channel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Frame limits and socket timeouts. The read timeout doubles as the
    /// spooler's idle poll interval, so `close()` is observed within it.
    pub frame: FrameConfig,
    /// Default wait for [`ReplyHandle::get`](crate::ReplyHandle::get).
    pub reply_timeout: Duration,
    /// Consecutive identical read failures tolerated before the channel terminates.
    pub retry_budget: u32,
}

impl ChannelConfig {
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_RETRY_BUDGET: u32 = 5;
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig {
                read_timeout: Some(Self::DEFAULT_READ_TIMEOUT),
                write_timeout: Some(Self::DEFAULT_WRITE_TIMEOUT),
                ..FrameConfig::default()
            },
            reply_timeout: Self::DEFAULT_REPLY_TIMEOUT,
            retry_budget: Self::DEFAULT_RETRY_BUDGET,
        }
    }
}
