//! Forwarding proxy: a method that is executed by the peer.
//!
//! A [`ForwardingProxy`] re-issues the inbound call against the peer under
//! the same method name and with the same positional parameters, then hands
//! back whatever the peer answered. It never looks at the parameters. The
//! only thing it knows about them is which positions must be masked in the
//! audit log.
//!
//! ```text
//! caller ──user.chpasswd("alice","s3cr3t")──▶ relay ──same call──▶ peer
//!                         │
//!                         └─ audit: user.chpasswd("alice", ***)
//! ```
//!
//! Descriptors are configured with `&mut self` (`hide_argument`) and then
//! moved into an `Arc`, after which they are read-only and shared by all
//! concurrent calls.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::RelayError;
use crate::request::{RequestAttributes, RequestHandler};
use crate::timeout::{CallTimeout, with_deadline};
use crate::transport::peer::PeerTransport;

/// Description used when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "Forwards the request to another server";

/// A method relayed verbatim to the peer.
pub struct ForwardingProxy {
    method: String,
    description: String,
    hidden_positions: HashSet<usize>,
    peer: Arc<dyn PeerTransport>,
    call_timeout: Option<CallTimeout>,
}

impl ForwardingProxy {
    /// Create a proxy for `method`, forwarding to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Configuration` if `method` is empty.
    pub fn new(
        method: impl Into<String>,
        peer: Arc<dyn PeerTransport>,
    ) -> Result<Self, RelayError> {
        let method = method.into();
        if method.is_empty() {
            return Err(RelayError::Configuration {
                details: "forwarded method name must not be empty".to_string(),
            });
        }

        Ok(Self {
            method,
            description: DEFAULT_DESCRIPTION.to_string(),
            hidden_positions: HashSet::new(),
            peer,
            call_timeout: None,
        })
    }

    /// Replace the default description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Bound every forwarded call by `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(CallTimeout::new(timeout));
        self
    }

    /// Mask the argument at `position` in audit output.
    ///
    /// Positions past the arity of an actual call simply never match.
    pub fn hide_argument(&mut self, position: usize) {
        self.hidden_positions.insert(position);
    }

    /// Method name used both locally and on the peer.
    pub fn method_name(&self) -> &str {
        &self.method
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether `position` is masked.
    pub fn is_hidden(&self, position: usize) -> bool {
        self.hidden_positions.contains(&position)
    }

    /// Hidden positions, sorted. For startup logging.
    pub fn hidden_positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.hidden_positions.iter().copied().collect();
        positions.sort_unstable();
        positions
    }
}

impl std::fmt::Debug for ForwardingProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingProxy")
            .field("method", &self.method)
            .field("description", &self.description)
            .field("hidden_positions", &self.hidden_positions())
            .field("peer", &self.peer.endpoint())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

#[async_trait]
impl RequestHandler for ForwardingProxy {
    fn method_name(&self) -> &str {
        &self.method
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn is_hidden(&self, position: usize) -> bool {
        ForwardingProxy::is_hidden(self, position)
    }

    async fn execute(
        &self,
        params: &[Value],
        att: &RequestAttributes,
    ) -> Result<Value, RelayError> {
        debug!(
            correlation_id = %att.correlation_id,
            method = %self.method,
            peer = %self.peer.endpoint(),
            param_count = params.len(),
            "Relaying call"
        );

        let call = with_deadline(
            self.call_timeout,
            self.peer.endpoint(),
            self.peer.call(&self.method, params),
        );

        tokio::select! {
            biased;
            _ = att.cancel.cancelled() => {
                debug!(
                    correlation_id = %att.correlation_id,
                    method = %self.method,
                    "Relayed call cancelled"
                );
                Err(RelayError::Cancelled {
                    method: self.method.clone(),
                })
            }
            outcome = call => outcome,
        }
    }
}
