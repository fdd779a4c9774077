//! Inbound JSON-RPC server.
//!
//! Routes:
//! - `POST {path}` (default `/RPC2`): one JSON-RPC 2.0 call
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus text format
//!
//! Each call runs on its own hyper task. If the client disconnects, the
//! handler future is dropped, which drops the in-flight peer request with
//! it. On shutdown, in-flight calls get `shutdown_timeout` to drain before
//! the server-wide cancellation token fires.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::request::{Credentials, RequestAttributes, RequestPipeline};
use crate::transport::jsonrpc::{JsonRpcResponse, parse_call};

/// Header carrying the caller's claimed name.
pub const USER_HEADER: &str = "x-rpc-user";

/// Header carrying the original client address when behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Listener and HTTP-layer settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub bind: String,
    /// Listen port
    pub port: u16,
    /// Path of the JSON-RPC endpoint
    pub path: String,
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Simultaneous in-flight requests
    pub max_concurrent_calls: usize,
    /// Drain window for in-flight calls on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 2634,
            path: "/RPC2".to_string(),
            max_body_bytes: 1024 * 1024, // 1 MB
            max_concurrent_calls: 1024,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// `bind:port` as a listen address string.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Shared state for request handlers.
pub struct RelayState {
    pipeline: RequestPipeline,
    shutdown: CancellationToken,
}

/// The relay's HTTP server.
pub struct RelayServer {
    config: ServerConfig,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Create a server that dispatches into `pipeline`.
    pub fn new(config: ServerConfig, pipeline: RequestPipeline) -> Self {
        Self {
            config,
            state: Arc::new(RelayState {
                pipeline,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Server-wide token; every call's cancellation token is a child of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Create the axum Router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.config.path, post(handle_rpc))
            .route("/health", get(handle_health))
            .route("/metrics", get(handle_metrics))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(ConcurrencyLimitLayer::new(self.config.max_concurrent_calls))
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves, then drain.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the server.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.state.shutdown.clone();
        let grace = self.config.shutdown_timeout;

        let signal = async move {
            shutdown.await;
            info!(
                grace_secs = grace.as_secs(),
                "Shutdown requested, draining in-flight calls"
            );
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                if !token.is_cancelled() {
                    warn!("Drain window elapsed, cancelling remaining calls");
                    token.cancel();
                }
            });
        };

        info!(
            addr = %listener.local_addr()?,
            path = %self.config.path,
            methods = ?self.state.pipeline.registry().methods(),
            "rpc-relay listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        self.state.shutdown.cancel();
        info!("rpc-relay stopped");
        Ok(())
    }
}

/// Pull caller credentials out of the request headers.
pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let token = text(header::AUTHORIZATION.as_str()).and_then(|v| {
        v.strip_prefix("Bearer ")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let remote_addr = text(FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next().map(|first| first.trim().to_string()));

    Credentials {
        user: text(USER_HEADER),
        token,
        remote_addr,
    }
}

async fn handle_rpc(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = match parse_call(&body) {
        Ok(call) => call,
        Err(rejected) => {
            let correlation_id = Uuid::new_v4().to_string();
            debug!(
                correlation_id = %correlation_id,
                error_type = rejected.error.error_type_name(),
                error = %rejected.error,
                "Rejected inbound payload"
            );
            let error = rejected.error.to_jsonrpc_error(&correlation_id);
            return Json(JsonRpcResponse::error(rejected.id, error)).into_response();
        }
    };

    let mut att = RequestAttributes::new(
        call.correlation_id,
        credentials_from_headers(&headers),
        state.shutdown.child_token(),
    );

    let outcome = state
        .pipeline
        .process(&call.method, &call.params, &mut att)
        .await;

    if call.is_notification() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let response = match outcome {
        Ok(result) => JsonRpcResponse::success(call.id, result),
        Err(e) => JsonRpcResponse::error(
            call.id,
            e.to_jsonrpc_error(&att.correlation_id.to_string()),
        ),
    };
    Json(response).into_response()
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_metrics(State(state): State<Arc<RelayState>>) -> Response {
    let Some(metrics) = state.pipeline.metrics() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.encode() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RelayMetrics;
    use crate::registry::MethodRegistry;
    use crate::system::VersionRequest;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn server() -> RelayServer {
        let mut registry = MethodRegistry::new();
        registry
            .register(Arc::new(VersionRequest::new()))
            .expect("register");
        let pipeline = RequestPipeline::new(Arc::new(registry))
            .with_metrics(RelayMetrics::new().expect("metrics"));
        RelayServer::new(ServerConfig::default(), pipeline)
    }

    async fn post_rpc(router: Router, body: &'static str) -> (StatusCode, Bytes) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/RPC2")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, bytes)
    }

    fn as_json(bytes: &Bytes) -> Value {
        serde_json::from_slice(bytes).expect("JSON body")
    }

    #[tokio::test]
    async fn test_local_method_round_trip() {
        let (status, body) = post_rpc(
            server().router(),
            r#"{"jsonrpc":"2.0","id":"a1","method":"system.version","params":[]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = as_json(&body);
        assert_eq!(json["id"], "a1");
        assert_eq!(json["result"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_method_error() {
        let (status, body) = post_rpc(
            server().router(),
            r#"{"jsonrpc":"2.0","id":3,"method":"vm.delete","params":[1]}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json = as_json(&body);
        assert_eq!(json["id"], 3);
        assert_eq!(json["error"]["code"], -32601);
        assert_eq!(json["error"]["data"]["error_type"], "method_not_found");
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let (_, body) = post_rpc(server().router(), "{oops").await;
        let json = as_json(&body);
        assert_eq!(json["id"], Value::Null);
        assert_eq!(json["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_named_params_rejected() {
        let (_, body) = post_rpc(
            server().router(),
            r#"{"jsonrpc":"2.0","id":1,"method":"system.version","params":{"a":1}}"#,
        )
        .await;
        let json = as_json(&body);
        assert_eq!(json["id"], 1);
        assert_eq!(json["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_notification_gets_no_content() {
        let (status, body) = post_rpc(
            server().router(),
            r#"{"jsonrpc":"2.0","method":"system.version"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let server = server();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);

        let router = server.router();
        post_rpc(
            router.clone(),
            r#"{"jsonrpc":"2.0","id":1,"method":"system.version"}"#,
        )
        .await;
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router is infallible");
        assert_eq!(response.status(), StatusCode::OK);
        let text = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let text = String::from_utf8_lossy(&text);
        assert!(text.contains("method=\"system.version\""));
    }

    #[test]
    fn test_credentials_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, "alice".parse().expect("header"));
        headers.insert(
            header::AUTHORIZATION,
            "Bearer tok-123".parse().expect("header"),
        );
        headers.insert(
            FORWARDED_FOR_HEADER,
            "10.0.0.1, 10.0.0.2".parse().expect("header"),
        );

        let creds = credentials_from_headers(&headers);
        assert_eq!(creds.user.as_deref(), Some("alice"));
        assert_eq!(creds.token.as_deref(), Some("tok-123"));
        assert_eq!(creds.remote_addr.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_credentials_ignore_non_bearer_auth() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            "Basic dXNlcjpwYXNz".parse().expect("header"),
        );
        let creds = credentials_from_headers(&headers);
        assert!(creds.token.is_none());
        assert!(creds.user.is_none());
    }
}
