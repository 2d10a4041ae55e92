//! Local model serving lifecycle: catalog, cache, load/unload, and
//! streaming completions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use model::{Catalog, ChatMessage, HttpEngine, Manager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> model::Result<()> {
//! let engine = Arc::new(HttpEngine::new("http://127.0.0.1:8080"));
//! let manager = Manager::new(Catalog::builtin(), "/var/cache/purser", engine);
//!
//! let descriptor = manager.resolve_alias("qwen2.5-14b")?;
//! manager.download(&descriptor, |pct| eprint!("\r{pct}%")).await?;
//! let chat = manager.load(&descriptor).await?;
//!
//! let mut chunks = chat
//!     .stream_complete(
//!         vec![ChatMessage::user("Why is the sky blue?")],
//!         CancellationToken::new(),
//!     )
//!     .await?;
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?.delta);
//! }
//!
//! manager.unload(&descriptor).await?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod chat;
mod engine;
mod error;
mod manager;
mod types;

pub use catalog::{Catalog, CatalogEntry};
pub use chat::ChatClient;
pub use engine::{ChunkStream, HttpEngine, InferenceEngine};
pub use error::{Error, Result};
pub use manager::{Manager, artifact_file_name};
pub use types::{CacheState, ChatChunk, ChatMessage, LoadState, ModelDescriptor, Role};
