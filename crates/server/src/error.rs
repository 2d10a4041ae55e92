//! Server error types.

use thiserror::Error;

/// Errors raised by registration and dispatch.
#[derive(Debug, Error)]
pub enum Error {
    /// A tool with this name is already registered.
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// The named tool is not in the registry.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The argument mapping does not satisfy the tool's input schema.
    /// Lists the offending field(s).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Transport(#[from] protocol::TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
