//! Request contract shared by every callable method.
//!
//! A method exposed by the relay is a [`RequestHandler`]. The
//! [`RequestPipeline`] owns the lifecycle around it:
//!
//! ```text
//! Received → PreProcessing → Executing → PostProcessing → Completed
//!                 │                           │
//!                 └──────────► Failed ◄───────┘
//! ```
//!
//! Pre-processing looks the handler up, renders the redacted
//! [`AuditRecord`], authenticates and authorizes the caller. Executing runs
//! the handler's step. Post-processing classifies the outcome, logs it, and
//! records metrics.

pub mod audit;
pub mod auth;
pub mod pipeline;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::RelayError;

pub use audit::{AuditRecord, REDACTED_PLACEHOLDER, RenderedArg};
pub use auth::{AllowAll, AnonymousAuthenticator, Authenticator, Authorizer, Caller, Credentials};
pub use pipeline::RequestPipeline;

/// Positional parameters of one call.
///
/// Values are dynamically typed. Handlers that only relay them never look
/// inside.
pub type ParamList = Vec<Value>;

/// A method the relay can serve.
///
/// Implementations are configured once, then shared read-only across all
/// concurrent calls through an `Arc<dyn RequestHandler>`. All per-call
/// state lives in [`RequestAttributes`].
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Name used for dispatch and logging.
    fn method_name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Whether the argument at `position` must be masked in audit output.
    fn is_hidden(&self, _position: usize) -> bool {
        false
    }

    /// Execute the call and produce its result.
    async fn execute(&self, params: &[Value], att: &RequestAttributes) -> Result<Value, RelayError>;
}

/// Lifecycle state of a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Decoded, nothing done yet
    Received,
    /// Lookup, audit, authentication, authorization
    PreProcessing,
    /// Handler step in flight
    Executing,
    /// Outcome being classified and logged
    PostProcessing,
    /// Finished with a result (terminal)
    Completed,
    /// Finished with an error (terminal)
    Failed,
}

impl RequestState {
    /// Whether the lifecycle has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, PreProcessing)
                | (PreProcessing, Executing)
                | (PreProcessing, Failed)
                | (Executing, PostProcessing)
                | (PostProcessing, Completed)
                | (PostProcessing, Failed)
        )
    }

    /// Lowercase label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::PreProcessing => "pre_processing",
            RequestState::Executing => "executing",
            RequestState::PostProcessing => "post_processing",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call context passed by reference through the whole lifecycle.
///
/// Owned by whoever received the call (normally the server), never by a
/// handler.
#[derive(Debug)]
pub struct RequestAttributes {
    /// Correlation ID carried by every log line of this call
    pub correlation_id: Uuid,
    /// Raw credentials presented by the caller
    pub credentials: Credentials,
    /// Authenticated caller, set during pre-processing
    pub caller: Option<Caller>,
    /// Wall-clock receive time for audit output
    pub received_at: DateTime<Utc>,
    /// Fires when the caller's interest in the result ends
    pub cancel: CancellationToken,
    state: RequestState,
    started: Instant,
}

impl RequestAttributes {
    /// Create attributes for a freshly received call.
    pub fn new(correlation_id: Uuid, credentials: Credentials, cancel: CancellationToken) -> Self {
        Self {
            correlation_id,
            credentials,
            caller: None,
            received_at: Utc::now(),
            cancel,
            state: RequestState::Received,
            started: Instant::now(),
        }
    }

    /// Attributes with anonymous credentials and a fresh token.
    pub fn anonymous() -> Self {
        Self::new(
            Uuid::new_v4(),
            Credentials::default(),
            CancellationToken::new(),
        )
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Name of the authenticated caller, or `-` before authentication.
    pub fn caller_name(&self) -> &str {
        self.caller.as_ref().map(|c| c.name.as_str()).unwrap_or("-")
    }

    /// Milliseconds since the call was received.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Advance the lifecycle.
    ///
    /// Illegal steps are refused and logged; the state is left unchanged.
    pub(crate) fn transition(&mut self, next: RequestState) -> bool {
        if !self.state.can_transition_to(next) {
            error!(
                correlation_id = %self.correlation_id,
                from = %self.state,
                to = %next,
                "Illegal request state transition"
            );
            return false;
        }
        debug!(
            correlation_id = %self.correlation_id,
            from = %self.state,
            to = %next,
            "Request state transition"
        );
        self.state = next;
        true
    }
}
