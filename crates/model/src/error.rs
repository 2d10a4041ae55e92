//! Lifecycle and inference error types.

use thiserror::Error;

/// Errors from the model catalog, lifecycle manager, and chat client.
///
/// Lifecycle failures leave the state machine in its last well-defined
/// state, so `download`/`load` are safe to retry once the cause is fixed.
#[derive(Debug, Error)]
pub enum Error {
    /// No catalog entry matches the requested alias.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The artifact could not be fetched or stored. State stays
    /// `NotCached`; no partial cache is exposed.
    #[error("download failed: {0}")]
    Download(String),

    /// The engine could not load the model, or it is not cached yet.
    #[error("load failed: {0}")]
    Load(String),

    /// The operation requires a state the model is not in (e.g. a chat
    /// client used after `unload`).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The inference engine failed mid-operation.
    #[error("engine: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, Error>;
