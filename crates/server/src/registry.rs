//! Tool registry: name -> (descriptor, handler), in registration order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use protocol::{ContentBlock, ToolDescriptor, ToolErrorCode};

use crate::error::{Error, Result};

/// A failure produced by a handler.
///
/// Never escapes as a transport fault: the dispatcher folds it into an
/// in-band `ToolResult { is_error: true }`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub code: ToolErrorCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ExecutionFailed, message)
    }
}

/// A pluggable tool capability.
///
/// Arguments arrive already validated against the descriptor's input
/// schema. A handler with mutable state is responsible for its own
/// synchronization; dispatches run concurrently.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: &Map<String, Value>)
    -> std::result::Result<Vec<ContentBlock>, HandlerError>;
}

/// Adapter for handlers that produce a plain textual result.
///
/// The returned string is wrapped as a single `Text` content block.
pub struct TextHandler<F>(pub F);

#[async_trait]
impl<F, Fut> ToolHandler for TextHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = std::result::Result<String, HandlerError>> + Send,
{
    async fn invoke(
        &self,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<Vec<ContentBlock>, HandlerError> {
        let text = (self.0)(arguments.clone()).await?;
        Ok(vec![ContentBlock::text(text)])
    }
}

/// Registered tools, enumerated in registration order.
///
/// Registration is a startup-time operation; freeze the registry into an
/// `Arc` before accepting connections. Dispatch after that point needs no
/// locking.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(ToolDescriptor, Arc<dyn ToolHandler>)>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails with [`Error::DuplicateTool`] on a name
    /// collision; the first registration wins.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        if self.by_name.contains_key(&descriptor.name) {
            return Err(Error::DuplicateTool(descriptor.name.clone()));
        }
        tracing::debug!(tool = %descriptor.name, "registered");
        self.by_name
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push((descriptor, handler));
        Ok(())
    }

    /// Snapshot of all descriptors, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&(ToolDescriptor, Arc<dyn ToolHandler>)> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, "test tool", json!({"type": "object"}))
    }

    fn noop() -> Arc<dyn ToolHandler> {
        Arc::new(TextHandler(|_: Map<String, Value>| async { Ok(String::new()) }))
    }

    #[test]
    fn enumeration_follows_registration_order() {
        let mut registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(descriptor(name), noop()).unwrap();
        }
        let names: Vec<_> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = Registry::new();
        registry.register(descriptor("echo"), noop()).unwrap();
        let err = registry.register(descriptor("echo"), noop()).unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn text_handler_wraps_output() {
        let handler = TextHandler(|args: Map<String, Value>| async move {
            let name = args.get("name").and_then(Value::as_str).unwrap_or("?");
            Ok(format!("My name is {name}"))
        });
        let mut args = Map::new();
        args.insert("name".to_string(), Value::String("Hardik".to_string()));
        let blocks = handler.invoke(&args).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].as_text(), Some("My name is Hardik"));
    }
}
