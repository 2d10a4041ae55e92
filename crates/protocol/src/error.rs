//! Transport error types.

use thiserror::Error;

/// A mid-session or setup fault in the byte channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("peer disconnected")]
    Disconnected,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
