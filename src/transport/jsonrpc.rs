//! JSON-RPC 2.0 types and parsing.
//!
//! # JSON-RPC 2.0 Compliance
//!
//! - Requests have `id`, `method`, and optional `params`
//! - Notifications are requests without `id`
//! - `id` type (string or integer) MUST be preserved in responses
//!
//! Only positional (array) params are accepted on the inbound side, since
//! argument redaction is defined by position.
//!
//! # Security Note
//!
//! This module parses untrusted input. Body size limits are enforced at the
//! HTTP layer (see server.rs).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::time::Instant;
use uuid::Uuid;

use crate::error::RelayError;
use crate::error::jsonrpc::JsonRpcError;
use crate::request::ParamList;

/// JSON-RPC 2.0 version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request ID.
///
/// JSON-RPC allows string or integer IDs. We preserve the exact type so
/// responses use the same type as requests. Never coerce between types.
///
/// `Null` is an explicit `"id": null`, which is distinct from a missing
/// `id` (a notification).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JsonRpcId {
    /// Integer ID (e.g., `"id": 1`)
    Number(i64),
    /// String ID (e.g., `"id": "abc-123"`)
    String(String),
    /// Explicit null ID (e.g., `"id": null`)
    Null,
}

impl Serialize for JsonRpcId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonRpcId::Number(n) => serializer.serialize_i64(*n),
            JsonRpcId::String(s) => serializer.serialize_str(s),
            JsonRpcId::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        id_from_value(value).map_err(serde::de::Error::custom)
    }
}

fn id_from_value(value: Value) -> Result<JsonRpcId, &'static str> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(JsonRpcId::Number)
            .ok_or("JSON-RPC ID must be integer, not float"),
        Value::String(s) => Ok(JsonRpcId::String(s)),
        Value::Null => Ok(JsonRpcId::Null),
        _ => Err("JSON-RPC ID must be string, integer, or null"),
    }
}

/// Deserializes a field that may be present-but-null.
///
/// Used with `#[serde(default)]`: an absent field stays `None`, while an
/// explicit `null` becomes `Some(Value::Null)`.
pub(crate) fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 request as sent to the peer (and as read by test peers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: Cow<'static, str>,
    /// Request ID (None for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JsonRpcId>,
    /// Method name
    pub method: String,
    /// Positional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Build a request with positional params.
    pub fn positional(id: JsonRpcId, method: impl Into<String>, params: &[Value]) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id: Some(id),
            method: method.into(),
            params: Some(Value::Array(params.to_vec())),
        }
    }
}

/// JSON-RPC 2.0 response.
///
/// The `id` field always serializes: `None` becomes `"id": null`.
/// `result` distinguishes an absent member (`None`) from `"result": null`
/// (`Some(Value::Null)`), because `null` is a legitimate method result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: Cow<'static, str>,
    /// Request ID
    #[serde(default)]
    pub id: Option<JsonRpcId>,
    /// Result (mutually exclusive with error)
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error (mutually exclusive with result)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    ///
    /// Pass `None` as `id` when the request ID could not be determined
    /// (e.g., parse error); it serializes as `"id": null`.
    pub fn error(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Raw inbound request. Every field is optional so malformed requests can
/// still yield their `id` for the error response.
#[derive(Debug, Deserialize)]
struct RawJsonRpcRequest {
    jsonrpc: Option<String>,
    #[serde(default, deserialize_with = "deserialize_present")]
    id: Option<Value>,
    method: Option<String>,
    params: Option<Value>,
}

/// Parsed and validated inbound call.
#[derive(Clone)]
pub struct InboundCall {
    /// Original JSON-RPC ID (None for notifications)
    pub id: Option<JsonRpcId>,
    /// Method name
    pub method: String,
    /// Positional parameters, in order
    pub params: ParamList,
    /// Timestamp when the call was decoded
    pub received_at: Instant,
    /// Unique correlation ID for tracing
    pub correlation_id: Uuid,
}

/// Params may hold passwords or tokens, so Debug only shows the count.
impl std::fmt::Debug for InboundCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundCall")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("params", &format_args!("<{} redacted>", self.params.len()))
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

impl InboundCall {
    /// Returns true if this is a notification (no ID).
    #[inline]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An inbound payload that could not be turned into an [`InboundCall`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedCall {
    /// The request ID, when it could be recovered
    pub id: Option<JsonRpcId>,
    /// Why the payload was rejected
    pub error: RelayError,
}

impl RejectedCall {
    fn new(id: Option<JsonRpcId>, error: RelayError) -> Self {
        Self { id, error }
    }
}

/// Parse JSON bytes into a single JSON-RPC 2.0 call.
///
/// # Errors
///
/// * `ParseError` (-32700) - malformed JSON
/// * `InvalidRequest` (-32600) - valid JSON, invalid JSON-RPC structure
///   (batches included, which this relay does not accept)
/// * `InvalidParams` (-32602) - by-name (object) or scalar params
pub fn parse_call(bytes: &[u8]) -> Result<InboundCall, RejectedCall> {
    let first_byte = bytes.iter().find(|b| !b.is_ascii_whitespace()).ok_or_else(|| {
        RejectedCall::new(
            None,
            RelayError::ParseError {
                details: "empty input".to_string(),
            },
        )
    })?;

    if *first_byte == b'[' {
        return Err(RejectedCall::new(
            None,
            RelayError::InvalidRequest {
                details: "batch requests are not supported".to_string(),
            },
        ));
    }

    let raw: RawJsonRpcRequest = serde_json::from_slice(bytes).map_err(|e| {
        // Distinguish syntax errors (bad JSON) from semantic errors
        // (valid JSON of the wrong shape).
        let error = if e.is_syntax() || e.is_eof() {
            RelayError::ParseError {
                details: e.to_string(),
            }
        } else {
            RelayError::InvalidRequest {
                details: e.to_string(),
            }
        };
        RejectedCall::new(None, error)
    })?;

    let id = match raw.id {
        None => None,
        Some(value) => Some(id_from_value(value).map_err(|details| {
            RejectedCall::new(
                None,
                RelayError::InvalidRequest {
                    details: details.to_string(),
                },
            )
        })?),
    };

    if raw.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return Err(RejectedCall::new(
            id,
            RelayError::InvalidRequest {
                details: "jsonrpc must be \"2.0\"".to_string(),
            },
        ));
    }

    let method = match raw.method {
        Some(m) if !m.is_empty() => m,
        _ => {
            return Err(RejectedCall::new(
                id,
                RelayError::InvalidRequest {
                    details: "method must be a non-empty string".to_string(),
                },
            ));
        }
    };

    let params = match raw.params {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::Object(_)) => {
            return Err(RejectedCall::new(
                id,
                RelayError::InvalidParams {
                    details: "named parameters are not supported, use a positional array"
                        .to_string(),
                },
            ));
        }
        Some(_) => {
            return Err(RejectedCall::new(
                id,
                RelayError::InvalidParams {
                    details: "params must be an array".to_string(),
                },
            ));
        }
    };

    Ok(InboundCall {
        id,
        method,
        params,
        received_at: Instant::now(),
        correlation_id: Uuid::new_v4(),
    })
}
