//! Protocol client session (handshake, discovery, invocation).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;

use protocol::{
    CallToolParams, Connection, Frame, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, PeerInfo, RequestId, ToolDescriptor, ToolResult,
    TransportError, decode_frame, encode_frame, error_codes, methods,
};

use crate::error::{Error, Result};

/// Default timeout for protocol operations, including the handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// An established session with a tool server.
///
/// Holds no durable state: the tool snapshot lives only as long as the
/// session, and nothing survives a process restart.
pub struct Session {
    conn: Mutex<Box<dyn Connection>>,
    next_id: AtomicI64,
    timeout: Duration,
    server_info: PeerInfo,
    tools: Mutex<Vec<ToolDescriptor>>,
}

impl Session {
    /// Perform the handshake over an open connection.
    ///
    /// Negotiates capabilities, announces readiness, and takes an initial
    /// tool snapshot. Fails with [`Error::Connect`] when the handshake does
    /// not complete within [`DEFAULT_TIMEOUT`].
    pub async fn connect(conn: impl Connection + 'static) -> Result<Self> {
        Self::connect_with_timeout(conn, DEFAULT_TIMEOUT).await
    }

    /// [`Session::connect`] with an explicit per-operation timeout.
    pub async fn connect_with_timeout(
        conn: impl Connection + 'static,
        timeout: Duration,
    ) -> Result<Self> {
        let session = Self {
            conn: Mutex::new(Box::new(conn)),
            next_id: AtomicI64::new(1),
            timeout,
            server_info: PeerInfo {
                name: String::new(),
                version: None,
            },
            tools: Mutex::new(Vec::new()),
        };

        let result: InitializeResult = session
            .request(methods::INITIALIZE, Some(InitializeParams::default()))
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;
        session
            .notify(methods::INITIALIZED)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        tracing::debug!(server = %result.server_info.name, "session established");

        let mut session = session;
        session.server_info = result.server_info;
        session.list_tools().await?;
        Ok(session)
    }

    /// Identity the server announced during the handshake.
    pub fn server_info(&self) -> &PeerInfo {
        &self.server_info
    }

    /// Fetch the server's tools, refreshing the local snapshot.
    ///
    /// Order matches server registration order; callers must not assume it
    /// is alphabetic.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result: ListToolsResult = self.request(methods::LIST_TOOLS, None::<()>).await?;
        *self.tools.lock().await = result.tools.clone();
        Ok(result.tools)
    }

    /// Invoke a tool by name.
    ///
    /// A name absent from the last discovery snapshot is rejected locally
    /// with the same [`Error::ToolNotFound`] a server-side rejection maps
    /// to. An in-band handler failure comes back as `Ok` with
    /// `ToolResult::is_error` set.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult> {
        if !self.tools.lock().await.iter().any(|t| t.name == name) {
            return Err(Error::ToolNotFound(name.to_string()));
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        self.request(methods::CALL_TOOL, Some(params)).await
    }

    /// Liveness probe. Completes once the server answers.
    pub async fn ping(&self) -> Result<()> {
        let _: Value = self.request(methods::PING, None::<()>).await?;
        Ok(())
    }

    /// Close the session's connection.
    pub async fn close(self) -> Result<()> {
        self.conn.lock().await.close().await?;
        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        let frame = encode_frame(&request)?;

        // One request/response pair at a time per connection; pairing is
        // re-checked against the echoed id below.
        let mut conn = self.conn.lock().await;
        conn.send(&frame).await?;
        let line = timeout(self.timeout, conn.recv())
            .await
            .map_err(|_| TransportError::Timeout)??;
        drop(conn);

        let response = match decode_frame(&line)? {
            Frame::Response(response) => response,
            other => {
                return Err(Error::Decode(protocol::DecodeError(format!(
                    "expected response, got {other:?}"
                ))));
            }
        };
        if response.id != id {
            return Err(Error::Decode(protocol::DecodeError(format!(
                "response id mismatch: expected {id:?}, got {:?}",
                response.id
            ))));
        }

        let value = response.result.clone();
        match response.into_result() {
            Ok(_) => {}
            Err(error) => {
                return Err(match error.code {
                    error_codes::TOOL_NOT_FOUND => Error::ToolNotFound(error.message),
                    error_codes::INVALID_PARAMS => Error::InvalidArguments(error.message),
                    _ => Error::ServerFault(error),
                });
            }
        }

        serde_json::from_value(value.unwrap_or(Value::Null))
            .map_err(|e| Error::Decode(protocol::DecodeError(e.to_string())))
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let frame = encode_frame(&JsonRpcNotification::new(method))?;
        self.conn.lock().await.send(&frame).await?;
        Ok(())
    }
}
