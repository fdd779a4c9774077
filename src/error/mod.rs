//! Error handling for rpc-relay.
//!
//! This module defines every error a relayed call can end in and maps each
//! one onto a JSON-RPC 2.0 error object.
//!
//! ## Peer failures
//!
//! A forwarded call can fail in two distinct ways, and callers need to tell
//! them apart:
//!
//! - [`RelayError::PeerUnreachable`]: the peer could not be reached or did
//!   not produce a usable JSON-RPC reply (connect failure, timeout, protocol
//!   garbage). Retryable.
//! - [`RelayError::PeerRejected`]: the peer ran the call and answered with a
//!   JSON-RPC error. The peer's code, message, and data are passed back
//!   untouched.

pub mod jsonrpc;

use std::fmt;

use jsonrpc::{ErrorData, JsonRpcError};
use serde_json::Value;
use thiserror::Error;

/// Why the peer could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableCause {
    /// TCP/TLS connection could not be established
    Connect,
    /// The peer did not answer in time
    Timeout,
    /// The peer answered with something that is not a usable JSON-RPC reply
    Protocol,
}

impl UnreachableCause {
    /// Stable lowercase label for logs and error details.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnreachableCause::Connect => "connect",
            UnreachableCause::Timeout => "timeout",
            UnreachableCause::Protocol => "protocol",
        }
    }
}

impl fmt::Display for UnreachableCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All error types that can occur in rpc-relay.
///
/// Each variant maps to a specific JSON-RPC error code and provides
/// structured error information for clients.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelayError {
    /// Invalid configuration, such as a proxy with an empty method name.
    ///
    /// Only raised while the relay is being wired up; never at call time.
    #[error("Configuration error: {details}")]
    Configuration {
        /// What is wrong with the configuration
        details: String,
    },

    // Protocol errors
    /// Invalid JSON in request body.
    #[error("Invalid JSON: {details}")]
    ParseError {
        /// Description of the parse error
        details: String,
    },

    /// Request is not a valid JSON-RPC 2.0 message.
    #[error("Invalid JSON-RPC request: {details}")]
    InvalidRequest {
        /// Description of what makes the request invalid
        details: String,
    },

    /// The requested method is not registered.
    #[error("Method '{method}' not found")]
    MethodNotFound {
        /// The method name that was not found
        method: String,
    },

    /// The parameters are not a positional list.
    #[error("Invalid parameters: {details}")]
    InvalidParams {
        /// Description of the parameter problem
        details: String,
    },

    // Pipeline errors
    /// The caller could not be authenticated.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason for the failure (safe for clients)
        reason: String,
    },

    /// The caller is not allowed to invoke this method.
    #[error("Caller '{caller}' is not authorized to call '{method}'")]
    AuthorizationDenied {
        /// The method that was denied
        method: String,
        /// The caller that was denied
        caller: String,
    },

    // Peer errors
    /// The peer could not be reached or gave no usable reply.
    #[error("Peer unreachable ({cause}): {reason}")]
    PeerUnreachable {
        /// Peer endpoint
        peer: String,
        /// Failure class
        cause: UnreachableCause,
        /// Human-readable reason
        reason: String,
    },

    /// The peer executed the call and returned an application error.
    #[error("{message}")]
    PeerRejected {
        /// Error code reported by the peer
        code: i32,
        /// Error message reported by the peer
        message: String,
        /// Error data reported by the peer
        data: Option<Value>,
    },

    /// The call was cancelled before the peer answered.
    #[error("Call to '{method}' was cancelled")]
    Cancelled {
        /// The method whose call was cancelled
        method: String,
    },

    /// Internal server error - should not happen.
    #[error("Internal error. Reference: {correlation_id}")]
    InternalError {
        /// Correlation ID for debugging
        correlation_id: String,
    },
}

impl RelayError {
    /// Maps error to JSON-RPC 2.0 error code.
    ///
    /// Standard JSON-RPC codes (-32700 to -32603) are used for protocol
    /// errors, -32000 to -32004 for relay errors. Peer rejections keep the
    /// peer's own code.
    pub fn to_jsonrpc_code(&self) -> i32 {
        match self {
            // Standard JSON-RPC codes
            Self::ParseError { .. } => -32700,
            Self::InvalidRequest { .. } => -32600,
            Self::MethodNotFound { .. } => -32601,
            Self::InvalidParams { .. } => -32602,
            Self::Configuration { .. } | Self::InternalError { .. } => -32603,

            // Relay codes
            Self::PeerUnreachable { .. } => -32000,
            Self::AuthenticationFailed { .. } => -32001,
            Self::AuthorizationDenied { .. } => -32003,
            Self::Cancelled { .. } => -32004,

            Self::PeerRejected { code, .. } => *code,
        }
    }

    /// Returns the error type name for metrics and logging.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::ParseError { .. } => "parse_error",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::MethodNotFound { .. } => "method_not_found",
            Self::InvalidParams { .. } => "invalid_params",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::PeerUnreachable { .. } => "peer_unreachable",
            Self::PeerRejected { .. } => "peer_rejected",
            Self::Cancelled { .. } => "cancelled",
            Self::InternalError { .. } => "internal_error",
        }
    }

    /// Whether the same call may succeed if retried unchanged.
    ///
    /// Transport trouble and cancellation are transient. Everything the
    /// peer or the pipeline deliberately rejected is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PeerUnreachable { .. } | Self::Cancelled { .. })
    }

    /// Returns safe details for client consumption (no sensitive data).
    pub fn safe_details(&self) -> Option<Value> {
        match self {
            Self::MethodNotFound { method } | Self::Cancelled { method } => {
                Some(serde_json::json!({ "method": method }))
            }
            Self::AuthorizationDenied { method, .. } => {
                Some(serde_json::json!({ "method": method }))
            }
            Self::PeerUnreachable { cause, .. } => {
                // The peer URL may embed credentials; only the class goes out.
                Some(serde_json::json!({ "cause": cause.as_str() }))
            }
            _ => None,
        }
    }

    /// Converts error to a JSON-RPC error object.
    ///
    /// A [`RelayError::PeerRejected`] is turned back into exactly the error
    /// the peer sent, so the proxy hop is invisible to the caller.
    pub fn to_jsonrpc_error(&self, correlation_id: &str) -> JsonRpcError {
        match self {
            Self::PeerRejected {
                code,
                message,
                data,
            } => JsonRpcError {
                code: *code,
                message: message.clone(),
                data: data.clone(),
            },
            _ => JsonRpcError {
                code: self.to_jsonrpc_code(),
                message: self.to_string(),
                data: Some(
                    ErrorData {
                        correlation_id: correlation_id.to_string(),
                        error_type: self.error_type_name().to_string(),
                        retryable: self.is_retryable(),
                        details: self.safe_details(),
                    }
                    .into_value(),
                ),
            },
        }
    }
}

impl From<JsonRpcError> for RelayError {
    fn from(error: JsonRpcError) -> Self {
        RelayError::PeerRejected {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}
