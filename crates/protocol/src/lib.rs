//! Shared tool-protocol vocabulary: wire envelope, content blocks, and the
//! transport abstraction both the client and the server ride on.
//!
//! The wire encoding is newline-delimited JSON-RPC 2.0. Frames are
//! correlated by a caller-chosen request id echoed by the responder;
//! transport itself is transparent to message semantics.

mod envelope;
mod error;
mod tool;
mod transport;

pub use envelope::{
    CallToolParams, DecodeError, Frame, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PeerInfo,
    PROTOCOL_VERSION, RequestId, decode_frame, encode_frame, error_codes, methods,
};
pub use error::TransportError;
pub use tool::{ContentBlock, ToolDescriptor, ToolErrorCode, ToolResult};
pub use transport::{
    Connection, MAX_FRAME_SIZE, StreamConnection, TcpConnection, connect_tcp, duplex_pair,
    tcp_connection,
};
