//! Request dispatch and the serve loop.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use protocol::{
    CallToolParams, Connection, Frame, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, PROTOCOL_VERSION, PeerInfo, ToolErrorCode, ToolResult, TransportError,
    decode_frame, encode_frame, error_codes, methods, tcp_connection,
};

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema;

/// A protocol server: a frozen registry plus dispatch discipline.
///
/// Handler failures become in-band `is_error` results; only protocol-level
/// rejections (unknown tool, schema violation) surface as error responses.
pub struct Server {
    registry: Arc<Registry>,
    info: PeerInfo,
}

impl Server {
    /// Freeze a registry and take up serving. No tools can be registered
    /// past this point.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            info: PeerInfo {
                name: "purser-server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.info.name = name.into();
        self
    }

    /// Full registry snapshot, in registration order.
    pub fn handle_list_tools(&self) -> Vec<protocol::ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Look up, validate, invoke, and wrap.
    ///
    /// `Err` here means a protocol-level rejection; a failing handler still
    /// returns `Ok` with `is_error` set and at least one `ToolError` block.
    pub async fn handle_call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolResult> {
        let (descriptor, handler) = self
            .registry
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        if let Err(fields) = schema::validate(&descriptor.input_schema, &arguments) {
            return Err(Error::InvalidArguments(fields.join(", ")));
        }

        tracing::debug!(tool = name, "dispatching");
        let outcome = AssertUnwindSafe(handler.invoke(&arguments))
            .catch_unwind()
            .await;
        Ok(match outcome {
            Ok(Ok(content)) => ToolResult::from_blocks(content),
            Ok(Err(failure)) => {
                tracing::warn!(tool = name, error = %failure, "handler failed");
                ToolResult::error(failure.code, failure.message)
            }
            Err(_) => {
                tracing::error!(tool = name, "handler panicked");
                ToolResult::error(ToolErrorCode::Internal, format!("tool {name} panicked"))
            }
        })
    }

    /// Dispatch one request to its method handler.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            methods::INITIALIZE => JsonRpcResponse::success(
                id,
                InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    server_info: self.info.clone(),
                },
            ),
            methods::LIST_TOOLS => JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.handle_list_tools(),
                },
            ),
            methods::CALL_TOOL => {
                let params: CallToolParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            return JsonRpcResponse::failure(
                                id,
                                error_codes::INVALID_PARAMS,
                                format!("malformed params: {e}"),
                            );
                        }
                    };
                let arguments = params.arguments.unwrap_or_default();
                match self.handle_call_tool(&params.name, arguments).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(Error::ToolNotFound(name)) => JsonRpcResponse::failure(
                        id,
                        error_codes::TOOL_NOT_FOUND,
                        format!("tool not found: {name}"),
                    ),
                    Err(Error::InvalidArguments(fields)) => JsonRpcResponse::failure(
                        id,
                        error_codes::INVALID_PARAMS,
                        format!("invalid arguments: {fields}"),
                    ),
                    Err(e) => {
                        JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, e.to_string())
                    }
                }
            }
            methods::PING => JsonRpcResponse::success(id, Value::Object(Map::new())),
            other => JsonRpcResponse::failure(
                id,
                error_codes::METHOD_NOT_FOUND,
                format!("unknown method: {other}"),
            ),
        }
    }

    /// Handle one wire frame; `None` means nothing goes back (notification
    /// or unanswerable garbage).
    pub async fn handle_frame(&self, line: &str) -> Option<String> {
        match decode_frame(line) {
            Ok(Frame::Request(request)) => {
                let response = self.handle_request(request).await;
                encode_frame(&response).ok()
            }
            Ok(Frame::Notification(note)) => {
                tracing::debug!(method = %note.method, "notification");
                None
            }
            Ok(Frame::Response(_)) => {
                tracing::warn!("unexpected response frame from client");
                None
            }
            Err(e) => {
                // Parse errors carry a null id per JSON-RPC 2.0.
                tracing::warn!(error = %e, "unparseable frame");
                Some(
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": null,
                        "error": {"code": error_codes::PARSE_ERROR, "message": e.to_string()},
                    })
                    .to_string(),
                )
            }
        }
    }

    /// Serve a single established connection until the peer disconnects.
    pub async fn serve_connection(&self, mut conn: impl Connection) -> Result<()> {
        loop {
            let line = match conn.recv().await {
                Ok(line) => line,
                Err(TransportError::Disconnected) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if line.is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_frame(&line).await {
                conn.send(&reply).await?;
            }
        }
    }

    /// Accept TCP connections and serve each on its own task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "serving");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                tracing::debug!(%peer, "connection accepted");
                if let Err(e) = server.serve_connection(tcp_connection(stream)).await {
                    tracing::warn!(%peer, error = %e, "connection error");
                }
            });
        }
    }
}
