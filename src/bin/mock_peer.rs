//! Stand-in peer for manual testing: a JSON-RPC server on `/RPC2`.
//!
//! Every method succeeds and echoes its params, except methods ending in
//! `.fail`, which answer with a JSON-RPC error. `MOCK_PEER_DELAY_MS`
//! simulates a slow peer.

use axum::{Json, Router, routing::post};
use rpc_relay::error::jsonrpc::JsonRpcError;
use rpc_relay::transport::{JsonRpcRequest, JsonRpcResponse};
use serde_json::json;
use std::{net::SocketAddr, time::Duration};
use tokio::time::sleep;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let port: u16 = env_or("MOCK_PEER_PORT", 2633);
    let delay = Duration::from_millis(env_or("MOCK_PEER_DELAY_MS", 0));

    let app = Router::new().route(
        "/RPC2",
        post(move |Json(request): Json<JsonRpcRequest>| mock_call(request, delay)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(addr = %addr, delay_ms = delay.as_millis() as u64, "Mock peer listening");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind");
        e
    })?;

    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!(error = %e, "Server error");
        e
    })?;

    Ok(())
}

async fn mock_call(request: JsonRpcRequest, delay: Duration) -> Json<JsonRpcResponse> {
    // Log the method only; params may carry secrets.
    tracing::info!(method = %request.method, "Received call");

    if !delay.is_zero() {
        sleep(delay).await;
    }

    if request.method.ends_with(".fail") {
        return Json(JsonRpcResponse::error(
            request.id,
            JsonRpcError {
                code: 1024,
                message: format!("[{}] mock failure", request.method),
                data: None,
            },
        ));
    }

    let params = request.params.unwrap_or_else(|| json!([]));
    Json(JsonRpcResponse::success(
        request.id,
        json!({ "method": request.method, "params": params }),
    ))
}
