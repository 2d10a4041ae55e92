//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// The `--args` value was not a JSON object.
    #[error("arguments must be a JSON object, e.g. '{{\"name\": \"Hardik\"}}'")]
    BadArguments,

    /// An error occurred in the protocol client.
    #[error(transparent)]
    Client(#[from] client::Error),

    /// An error occurred in the protocol server.
    #[error(transparent)]
    Server(#[from] server::Error),

    /// An error occurred in the model lifecycle layer.
    #[error(transparent)]
    Model(#[from] model::Error),

    /// A transport-level error occurred.
    #[error(transparent)]
    Transport(#[from] protocol::TransportError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
