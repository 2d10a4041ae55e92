//! Protocol server: tool registry, argument validation, and dispatch.
//!
//! Tools are registered once at startup; the registry is frozen before the
//! server accepts connections. Enumeration follows registration order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use server::{Registry, Server, TextHandler};
//! use protocol::ToolDescriptor;
//!
//! # async fn example() -> server::Result<()> {
//! let mut registry = Registry::new();
//! registry.register(
//!     ToolDescriptor::new(
//!         "echo",
//!         "Echo a name",
//!         json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
//!     ),
//!     Arc::new(TextHandler(|args: serde_json::Map<String, serde_json::Value>| async move {
//!         let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("stranger");
//!         Ok(format!("My name is {name}"))
//!     })),
//! )?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5231").await?;
//! Arc::new(Server::new(registry)).serve(listener).await
//! # }
//! ```

mod error;
mod registry;
mod schema;
mod server;

pub use error::{Error, Result};
pub use registry::{HandlerError, Registry, TextHandler, ToolHandler};
pub use schema::validate;
pub use server::Server;
