//! Methods answered by the relay itself instead of the peer.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;
use crate::request::{RequestAttributes, RequestHandler};

/// `system.version`: reports the relay's own version.
#[derive(Debug, Clone)]
pub struct VersionRequest {
    method: String,
}

impl VersionRequest {
    /// Method name this handler registers under.
    pub const METHOD: &'static str = "system.version";

    pub fn new() -> Self {
        Self {
            method: Self::METHOD.to_string(),
        }
    }
}

impl Default for VersionRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestHandler for VersionRequest {
    fn method_name(&self) -> &str {
        &self.method
    }

    fn description(&self) -> &str {
        "Returns the rpc-relay version"
    }

    async fn execute(
        &self,
        _params: &[Value],
        _att: &RequestAttributes,
    ) -> Result<Value, RelayError> {
        Ok(Value::String(env!("CARGO_PKG_VERSION").to_string()))
    }
}
