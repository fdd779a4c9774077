//! JSON-RPC 2.0 error response structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 error object.
///
/// `data` is kept as a raw [`Value`] so that errors relayed from the peer
/// keep whatever payload the peer attached. Locally produced errors put an
/// [`ErrorData`] there instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (standard, relay-specific, or copied from the peer)
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Additional error data (optional). An explicit `null` is kept as
    /// `Some(Value::Null)` so it survives the relay hop.
    #[serde(
        default,
        deserialize_with = "crate::transport::jsonrpc::deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
}

/// Additional context attached to errors raised by the relay itself.
///
/// All fields are safe for client consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Identifier for finding this call in the relay logs
    pub correlation_id: String,

    /// Machine-readable error type name
    pub error_type: String,

    /// Whether the caller may retry the same call
    pub retryable: bool,

    /// Type-specific error details (sanitized)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorData {
    /// Convert into the raw `data` member of a [`JsonRpcError`].
    pub fn into_value(self) -> Value {
        // Serializing a struct of strings and bools cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_error_serialization() {
        let error = JsonRpcError {
            code: -32000,
            message: "Peer unreachable".to_string(),
            data: Some(
                ErrorData {
                    correlation_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
                    error_type: "peer_unreachable".to_string(),
                    retryable: true,
                    details: None,
                }
                .into_value(),
            ),
        };

        let json = serde_json::to_value(&error).expect("should serialize");
        assert_eq!(json["code"], -32000);
        assert_eq!(json["data"]["error_type"], "peer_unreachable");
        assert_eq!(json["data"]["retryable"], true);
        assert!(json["data"].get("details").is_none());
    }

    #[test]
    fn test_error_without_data_omits_field() {
        let error = JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        };

        let json = serde_json::to_string(&error).expect("should serialize");
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_foreign_data_is_preserved() {
        let raw = json!({"code": 1002, "message": "denied", "data": [1, "x"]});
        let error: JsonRpcError = serde_json::from_value(raw.clone()).expect("should parse");
        assert_eq!(error.data, Some(json!([1, "x"])));
        assert_eq!(serde_json::to_value(&error).expect("should serialize"), raw);
    }

    #[test]
    fn test_null_data_is_distinct_from_absent() {
        let with_null = json!({"code": 1, "message": "x", "data": null});
        let error: JsonRpcError = serde_json::from_value(with_null.clone()).expect("should parse");
        assert_eq!(error.data, Some(Value::Null));
        assert_eq!(serde_json::to_value(&error).expect("should serialize"), with_null);

        let without = json!({"code": 1, "message": "x"});
        let error: JsonRpcError = serde_json::from_value(without.clone()).expect("should parse");
        assert_eq!(error.data, None);
        assert_eq!(serde_json::to_value(&error).expect("should serialize"), without);
    }
}
