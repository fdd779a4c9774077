//! Mock JSON-RPC peer for integration testing.
//!
//! Answers per-method with a configured result, error, raw body, or delay,
//! and records every call it receives.

#![allow(dead_code)]

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// A canned answer for one method.
#[derive(Debug, Clone)]
enum Reply {
    Result(Value),
    Error {
        code: i32,
        message: String,
        data: Option<Value>,
    },
    Raw {
        status: StatusCode,
        body: String,
    },
}

/// A call as seen by the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub authorization: Option<String>,
}

/// Builder for a mock peer.
#[derive(Debug, Clone, Default)]
pub struct MockPeer {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
}

#[derive(Debug)]
struct MockState {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: RwLock<Vec<RecordedCall>>,
}

impl MockPeer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` with `result`.
    #[must_use]
    pub fn with_result(mut self, method: &str, result: Value) -> Self {
        self.replies
            .insert(method.to_string(), Reply::Result(result));
        self
    }

    /// Answer `method` with a JSON-RPC error.
    #[must_use]
    pub fn with_error(
        mut self,
        method: &str,
        code: i32,
        message: &str,
        data: Option<Value>,
    ) -> Self {
        self.replies.insert(
            method.to_string(),
            Reply::Error {
                code,
                message: message.to_string(),
                data,
            },
        );
        self
    }

    /// Answer `method` with an arbitrary HTTP status and body.
    #[must_use]
    pub fn with_raw(mut self, method: &str, status: StatusCode, body: &str) -> Self {
        self.replies.insert(
            method.to_string(),
            Reply::Raw {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    /// Delay the answer to `method`.
    #[must_use]
    pub fn with_delay(mut self, method: &str, delay: Duration) -> Self {
        self.delays.insert(method.to_string(), delay);
        self
    }

    /// Start the mock peer on an ephemeral port.
    pub async fn start(self) -> MockPeerHandle {
        let state = Arc::new(MockState {
            replies: self.replies,
            delays: self.delays,
            calls: RwLock::new(Vec::new()),
        });

        let app = Router::new()
            .route("/RPC2", post(handle_call))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockPeerHandle {
            addr,
            state,
            _handle: handle,
        }
    }
}

/// Handle to the running mock peer.
pub struct MockPeerHandle {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    _handle: JoinHandle<()>,
}

impl MockPeerHandle {
    /// JSON-RPC endpoint URL.
    pub fn url(&self) -> String {
        format!("http://{}/RPC2", self.addr)
    }

    /// Every call received so far, in arrival order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.read().await.clone()
    }

    /// Number of calls received.
    pub async fn call_count(&self) -> usize {
        self.state.calls.read().await.len()
    }
}

async fn handle_call(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::OK,
                json!({
                    "jsonrpc": "2.0",
                    "error": {"code": -32700, "message": format!("Parse error: {}", e)},
                    "id": null
                })
                .to_string(),
            );
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    state.calls.write().await.push(RecordedCall {
        method: method.clone(),
        params: request.get("params").cloned().unwrap_or(Value::Null),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if let Some(delay) = state.delays.get(&method) {
        tokio::time::sleep(*delay).await;
    }

    let body = match state.replies.get(&method) {
        Some(Reply::Result(result)) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        Some(Reply::Error {
            code,
            message,
            data,
        }) => {
            let mut error = json!({"code": code, "message": message});
            if let Some(data) = data {
                error["data"] = data.clone();
            }
            json!({"jsonrpc": "2.0", "id": id, "error": error})
        }
        Some(Reply::Raw { status, body }) => return (*status, body.clone()),
        None => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("Method '{}' not found", method)}
        }),
    };

    (StatusCode::OK, body.to_string())
}
