//! End-to-end client/server tests over an in-memory connection pair.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};

use client::{Error, Session};
use protocol::{
    Connection, Frame, JsonRpcResponse, ToolDescriptor, TransportError, decode_frame, duplex_pair,
    encode_frame, error_codes, methods,
};
use server::{HandlerError, Registry, Server, TextHandler};

fn demo_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            ToolDescriptor::new(
                "employee_lookup",
                "Get the employee information from the employee API.",
                json!({
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"],
                    "additionalProperties": false
                }),
            ),
            Arc::new(TextHandler(|args: Map<String, Value>| async move {
                let name = args
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| HandlerError::execution("name missing"))?;
                Ok(format!("My name is {name}"))
            })),
        )
        .unwrap();
    registry
        .register(
            ToolDescriptor::new("zz_last", "Registered second", json!({"type": "object"})),
            Arc::new(TextHandler(|_: Map<String, Value>| async { Ok("ok".to_string()) })),
        )
        .unwrap();
    registry
}

async fn connected_session() -> Session {
    let (client_end, server_end) = duplex_pair();
    let server = Server::new(demo_registry());
    tokio::spawn(async move {
        let _ = server.serve_connection(server_end).await;
    });
    Session::connect(client_end).await.unwrap()
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn handshake_announces_server_identity() {
    let session = connected_session().await;
    assert_eq!(session.server_info().name, "purser-server");
}

#[tokio::test]
async fn list_tools_preserves_registration_order() {
    let session = connected_session().await;
    let names: Vec<_> = session
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, ["employee_lookup", "zz_last"]);
}

#[tokio::test]
async fn ping_round_trip() {
    let session = connected_session().await;
    session.ping().await.unwrap();
}

#[tokio::test]
async fn call_tool_round_trip() {
    let session = connected_session().await;
    let result = session
        .call_tool("employee_lookup", args(json!({"name": "Hardik"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.joined_text(), "My name is Hardik");
}

#[tokio::test]
async fn unknown_tool_rejected_locally() {
    let session = connected_session().await;
    let err = session.call_tool("missing", Map::new()).await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(name) if name == "missing"));
}

#[tokio::test]
async fn schema_violation_names_field() {
    let session = connected_session().await;
    let err = session
        .call_tool("employee_lookup", args(json!({"name": 42})))
        .await
        .unwrap_err();
    match err {
        Error::InvalidArguments(message) => assert!(message.contains("name")),
        other => panic!("expected InvalidArguments, got {other:?}"),
    }
}

/// A server that advertises a tool it then refuses to run: the stale-cache
/// path must map to the same `ToolNotFound` as a local snapshot miss.
#[tokio::test]
async fn server_side_rejection_maps_to_tool_not_found() {
    let (client_end, mut server_end) = duplex_pair();

    tokio::spawn(async move {
        loop {
            let line = match server_end.recv().await {
                Ok(line) => line,
                Err(_) => return,
            };
            let request = match decode_frame(&line) {
                Ok(Frame::Request(request)) => request,
                _ => continue,
            };
            let reply = match request.method.as_str() {
                methods::INITIALIZE => JsonRpcResponse::success(
                    request.id,
                    json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "stale"}}),
                ),
                methods::LIST_TOOLS => JsonRpcResponse::success(
                    request.id,
                    json!({"tools": [{
                        "name": "ghost",
                        "description": "No longer here",
                        "inputSchema": {"type": "object"}
                    }]}),
                ),
                methods::CALL_TOOL => JsonRpcResponse::failure(
                    request.id,
                    error_codes::TOOL_NOT_FOUND,
                    "tool not found: ghost",
                ),
                _ => continue,
            };
            let _ = server_end.send(&encode_frame(&reply).unwrap()).await;
        }
    });

    let session = Session::connect(client_end).await.unwrap();
    let err = session.call_tool("ghost", Map::new()).await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));
}

#[tokio::test]
async fn malformed_list_payload_is_decode_error() {
    let (client_end, mut server_end) = duplex_pair();

    tokio::spawn(async move {
        let mut first_list = true;
        loop {
            let line = match server_end.recv().await {
                Ok(line) => line,
                Err(_) => return,
            };
            let request = match decode_frame(&line) {
                Ok(Frame::Request(request)) => request,
                _ => continue,
            };
            let reply = match request.method.as_str() {
                methods::INITIALIZE => JsonRpcResponse::success(
                    request.id,
                    json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "bad"}}),
                ),
                methods::LIST_TOOLS if first_list => {
                    first_list = false;
                    JsonRpcResponse::success(request.id, json!({"tools": []}))
                }
                methods::LIST_TOOLS => {
                    JsonRpcResponse::success(request.id, json!({"tools": "not a list"}))
                }
                _ => continue,
            };
            let _ = server_end.send(&encode_frame(&reply).unwrap()).await;
        }
    });

    let session = Session::connect(client_end).await.unwrap();
    let err = session.list_tools().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn handshake_timeout_is_connect_error() {
    // Peer end stays open but never answers.
    let (client_end, _server_end) = duplex_pair();
    let err = Session::connect_with_timeout(client_end, Duration::from_millis(50))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Connect(_)));
}

#[tokio::test]
async fn silent_server_times_out_per_call() {
    let (client_end, mut server_end) = duplex_pair();

    // Answers the handshake and the first discovery, then goes quiet.
    tokio::spawn(async move {
        let mut answered_list = false;
        loop {
            let line = match server_end.recv().await {
                Ok(line) => line,
                Err(_) => return,
            };
            let request = match decode_frame(&line) {
                Ok(Frame::Request(request)) => request,
                _ => continue,
            };
            let reply = match request.method.as_str() {
                methods::INITIALIZE => JsonRpcResponse::success(
                    request.id,
                    json!({"protocolVersion": "2024-11-05", "serverInfo": {"name": "slow"}}),
                ),
                methods::LIST_TOOLS if !answered_list => {
                    answered_list = true;
                    JsonRpcResponse::success(request.id, json!({"tools": []}))
                }
                _ => continue,
            };
            let _ = server_end.send(&encode_frame(&reply).unwrap()).await;
        }
    });

    let session = Session::connect_with_timeout(client_end, Duration::from_millis(100))
        .await
        .unwrap();
    let err = session.list_tools().await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Timeout)));
}

#[tokio::test]
async fn concurrent_sessions_are_independent() {
    let registry = demo_registry();
    let server = Arc::new(Server::new(registry));

    let mut handles = Vec::new();
    for i in 0..4 {
        let server = Arc::clone(&server);
        handles.push(tokio::spawn(async move {
            let (client_end, server_end) = duplex_pair();
            tokio::spawn(async move {
                let _ = server.serve_connection(server_end).await;
            });
            let session = Session::connect(client_end).await.unwrap();
            let result = session
                .call_tool("employee_lookup", args(json!({"name": format!("user{i}")})))
                .await
                .unwrap();
            assert_eq!(result.joined_text(), format!("My name is user{i}"));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}
