//! Outbound JSON-RPC client for the peer.
//!
//! One [`PeerClient`] is shared by every proxied method. It keeps a pooled
//! reqwest client, so repeated calls reuse connections.
//!
//! # Error Classification
//!
//! - Peer replied with a JSON-RPC `error` → `PeerRejected` (verbatim)
//! - Timeout → `PeerUnreachable` / `Timeout`
//! - Connection failure → `PeerUnreachable` / `Connect`
//! - Anything else (HTTP failure without a JSON-RPC body, undecodable body,
//!   mismatched `id`, reply without `result`) → `PeerUnreachable` / `Protocol`
//!
//! No automatic retry: a forwarded call may have side effects on the peer.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{RelayError, UnreachableCause};
use crate::transport::jsonrpc::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};

/// Configuration for the peer client.
#[derive(Clone)]
pub struct PeerConfig {
    /// Full JSON-RPC endpoint URL (e.g., "http://master:2633/RPC2")
    pub url: String,
    /// Request timeout (includes connection + response)
    pub timeout: Duration,
    /// Connection timeout (TCP + TLS handshake)
    pub connect_timeout: Duration,
    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
    /// Idle connection timeout
    pub pool_idle_timeout: Duration,
    /// Bearer token presented to the peer
    pub token: Option<String>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            token: None,
        }
    }
}

impl std::fmt::Debug for PeerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PeerConfig {
    /// Create a new config with the specified URL.
    ///
    /// Uses default values for all other settings.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Something that can run a JSON-RPC call on the peer.
///
/// Abstracted so tests can inject peers without HTTP.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Endpoint identifier for logs and errors.
    fn endpoint(&self) -> &str;

    /// Call `method` on the peer with positional `params`.
    ///
    /// Returns the peer's `result` member unchanged.
    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RelayError>;
}

/// HTTP JSON-RPC client for the peer.
///
/// `Clone` is cheap; clones share the connection pool and id counter.
#[derive(Clone)]
pub struct PeerClient {
    client: Client,
    config: PeerConfig,
    next_id: Arc<AtomicI64>,
}

impl PeerClient {
    /// Create a new peer client.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Configuration` if the client cannot be built.
    pub fn new(config: PeerConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RelayError::Configuration {
                details: format!("cannot build peer client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            next_id: Arc::new(AtomicI64::new(1)),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    fn unreachable(&self, cause: UnreachableCause, reason: impl Into<String>) -> RelayError {
        RelayError::PeerUnreachable {
            peer: self.config.url.clone(),
            cause,
            reason: reason.into(),
        }
    }

    /// Classify a reqwest error into a `PeerUnreachable`.
    fn classify_error(&self, error: reqwest::Error, method: &str) -> RelayError {
        // The URL may carry credentials; keep it out of the reason text.
        let error = error.without_url();
        if error.is_timeout() {
            warn!(
                method = %method,
                timeout_secs = self.config.timeout.as_secs(),
                "Peer request timed out"
            );
            self.unreachable(UnreachableCause::Timeout, error.to_string())
        } else if error.is_connect() {
            warn!(method = %method, url = %self.config.url, "Failed to connect to peer");
            self.unreachable(UnreachableCause::Connect, error.to_string())
        } else {
            error!(method = %method, error = %error, "Peer request failed");
            self.unreachable(UnreachableCause::Protocol, error.to_string())
        }
    }

    /// Interpret a decoded peer reply for request `id`.
    ///
    /// An error reply may carry a null `id` (the peer could not read ours);
    /// it is still the peer's answer and is relayed as a rejection.
    fn interpret(&self, id: &JsonRpcId, response: JsonRpcResponse) -> Result<Value, RelayError> {
        let id_ok = match response.id.as_ref() {
            Some(reply_id) if reply_id == id => true,
            None | Some(JsonRpcId::Null) => response.error.is_some(),
            Some(_) => false,
        };
        if !id_ok {
            return Err(self.unreachable(
                UnreachableCause::Protocol,
                format!(
                    "reply id {:?} does not match request id {:?}",
                    response.id, id
                ),
            ));
        }

        match (response.result, response.error) {
            (_, Some(error)) => Err(RelayError::from(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(self.unreachable(
                UnreachableCause::Protocol,
                "reply has neither result nor error",
            )),
        }
    }

    /// Forward one call to the peer.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RelayError> {
        let id = JsonRpcId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::positional(id.clone(), method, params);

        debug!(
            method = %method,
            param_count = params.len(),
            "Forwarding call to peer"
        );

        let mut builder = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify_error(e, method))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_error(e, method))?;

        // Many JSON-RPC servers answer application errors with a non-2xx
        // status and a valid error body, so try the body first.
        let decoded = serde_json::from_slice::<JsonRpcResponse>(&body);
        let response = match decoded {
            Ok(response) => response,
            Err(e) if status.is_success() => {
                error!(method = %method, error = %e, "Failed to decode peer reply");
                return Err(self.unreachable(
                    UnreachableCause::Protocol,
                    format!("undecodable reply: {}", e),
                ));
            }
            Err(_) => {
                warn!(method = %method, status = %status, "Peer returned error status");
                return Err(self.unreachable(
                    UnreachableCause::Protocol,
                    format!("peer returned HTTP {}", status),
                ));
            }
        };

        let outcome = self.interpret(&id, response);
        debug!(
            method = %method,
            status = %status,
            rejected = matches!(outcome, Err(RelayError::PeerRejected { .. })),
            "Received peer reply"
        );
        outcome
    }
}

#[async_trait]
impl PeerTransport for PeerClient {
    fn endpoint(&self) -> &str {
        &self.config.url
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RelayError> {
        PeerClient::call(self, method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::jsonrpc::JsonRpcError;
    use serde_json::json;

    fn client() -> PeerClient {
        PeerClient::new(PeerConfig::with_url("http://localhost:2633/RPC2")).expect("client")
    }

    #[test]
    fn test_default_config() {
        let config = PeerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_max_idle_per_host, 32);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert!(config.url.is_empty());
        assert!(config.token.is_none());
    }

    #[test]
    fn test_config_debug_hides_token() {
        let config = PeerConfig {
            token: Some("peer-secret".to_string()),
            ..PeerConfig::with_url("http://peer")
        };
        assert!(!format!("{:?}", config).contains("peer-secret"));
    }

    #[test]
    fn test_interpret_success() {
        let client = client();
        let id = JsonRpcId::Number(1);
        let reply = JsonRpcResponse::success(Some(id.clone()), json!({"ID": 42}));
        assert_eq!(client.interpret(&id, reply), Ok(json!({"ID": 42})));
    }

    #[test]
    fn test_interpret_null_result_is_success() {
        let client = client();
        let id = JsonRpcId::Number(1);
        let reply = JsonRpcResponse::success(Some(id.clone()), Value::Null);
        assert_eq!(client.interpret(&id, reply), Ok(Value::Null));
    }

    #[test]
    fn test_interpret_error_is_rejection() {
        let client = client();
        let id = JsonRpcId::Number(9);
        let remote = JsonRpcError {
            code: 1024,
            message: "not authorized".to_string(),
            data: Some(json!("extra")),
        };
        let reply = JsonRpcResponse::error(Some(id.clone()), remote);
        assert_eq!(
            client.interpret(&id, reply),
            Err(RelayError::PeerRejected {
                code: 1024,
                message: "not authorized".to_string(),
                data: Some(json!("extra")),
            })
        );
    }

    #[test]
    fn test_interpret_mismatched_id_is_protocol_failure() {
        let client = client();
        let reply = JsonRpcResponse::success(Some(JsonRpcId::Number(2)), json!(1));
        let result = client.interpret(&JsonRpcId::Number(1), reply);
        assert!(matches!(
            result,
            Err(RelayError::PeerUnreachable {
                cause: UnreachableCause::Protocol,
                ..
            })
        ));
    }

    #[test]
    fn test_interpret_error_with_null_id_is_rejection() {
        let client = client();
        let reply: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32600, "message": "Invalid Request"}
        }))
        .expect("valid reply");

        let result = client.interpret(&JsonRpcId::Number(1), reply);
        assert_eq!(
            result,
            Err(RelayError::PeerRejected {
                code: -32600,
                message: "Invalid Request".to_string(),
                data: None,
            })
        );
        assert!(!result.unwrap_err().is_retryable());
    }

    #[test]
    fn test_interpret_success_with_null_id_is_protocol_failure() {
        let client = client();
        let reply = JsonRpcResponse::success(None, json!(1));
        assert!(matches!(
            client.interpret(&JsonRpcId::Number(1), reply),
            Err(RelayError::PeerUnreachable {
                cause: UnreachableCause::Protocol,
                ..
            })
        ));
    }

    #[test]
    fn test_interpret_error_with_other_id_is_protocol_failure() {
        let client = client();
        let remote = JsonRpcError {
            code: 1,
            message: "x".to_string(),
            data: None,
        };
        let reply = JsonRpcResponse::error(Some(JsonRpcId::Number(7)), remote);
        assert!(matches!(
            client.interpret(&JsonRpcId::Number(1), reply),
            Err(RelayError::PeerUnreachable {
                cause: UnreachableCause::Protocol,
                ..
            })
        ));
    }

    #[test]
    fn test_interpret_empty_reply_is_protocol_failure() {
        let client = client();
        let id = JsonRpcId::Number(1);
        let reply = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: Some(id.clone()),
            result: None,
            error: None,
        };
        assert!(matches!(
            client.interpret(&id, reply),
            Err(RelayError::PeerUnreachable {
                cause: UnreachableCause::Protocol,
                ..
            })
        ));
    }

    #[test]
    fn test_clones_share_id_counter() {
        let a = client();
        let b = a.clone();
        let first = a.next_id.fetch_add(1, Ordering::Relaxed);
        let second = b.next_id.fetch_add(1, Ordering::Relaxed);
        assert_eq!(second, first + 1);
    }
}
