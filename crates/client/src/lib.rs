//! Protocol client: session establishment, tool discovery, and invocation.
//!
//! # Example
//!
//! ```no_run
//! use client::Session;
//! use serde_json::{Map, Value};
//!
//! # async fn example() -> client::Result<()> {
//! let conn = protocol::connect_tcp("127.0.0.1:5231").await?;
//! let session = Session::connect(conn).await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("{}: {}", tool.name, tool.description);
//! }
//!
//! let mut args = Map::new();
//! args.insert("name".to_string(), Value::String("Hardik".to_string()));
//! let result = session.call_tool("employee_lookup", args).await?;
//! println!("{}", result.joined_text());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod session;

pub use error::{Error, Result};
pub use session::{DEFAULT_TIMEOUT, Session};
