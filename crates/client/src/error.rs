//! Client error types.

use protocol::{DecodeError, JsonRpcError, TransportError};
use thiserror::Error;

/// Errors surfaced by the protocol client.
///
/// Callers branch on the variant, never on message text. In-band tool
/// failures (`ToolResult::is_error`) are not errors at this layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The handshake did not complete.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server response could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The named tool is absent, whether from the local discovery snapshot
    /// or by server-side rejection.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The server rejected the argument mapping against the tool's schema.
    /// The message names the offending field(s).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The server failed in a way that is not a tool-level outcome.
    #[error("server fault: {0}")]
    ServerFault(JsonRpcError),

    /// A mid-session network fault.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;
