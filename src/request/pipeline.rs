//! Lifecycle driver shared by every handler.
//!
//! The pipeline is the only place that logs call arguments, and it only
//! ever logs them through an [`AuditRecord`], so handler-declared hidden
//! positions are always honoured.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::audit::AuditRecord;
use super::auth::{AllowAll, AnonymousAuthenticator, Authenticator, Authorizer};
use super::{RequestAttributes, RequestHandler, RequestState};
use crate::error::RelayError;
use crate::metrics::{RelayMetrics, SUCCESS_OUTCOME, UNKNOWN_METHOD_LABEL};
use crate::registry::MethodRegistry;

/// Runs calls through lookup, audit, auth, execution, and completion.
///
/// Cheap to clone; all parts are shared.
#[derive(Clone)]
pub struct RequestPipeline {
    registry: Arc<MethodRegistry>,
    authenticator: Arc<dyn Authenticator>,
    authorizer: Arc<dyn Authorizer>,
    metrics: Option<RelayMetrics>,
}

impl RequestPipeline {
    /// Pipeline with anonymous authentication and allow-all authorization.
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self {
            registry,
            authenticator: Arc::new(AnonymousAuthenticator),
            authorizer: Arc::new(AllowAll),
            metrics: None,
        }
    }

    /// Replace the authentication hook.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Replace the authorization hook.
    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Record call outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: RelayMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The method table this pipeline dispatches into.
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Metrics sink, if configured.
    pub fn metrics(&self) -> Option<&RelayMetrics> {
        self.metrics.as_ref()
    }

    /// Process one call to completion.
    ///
    /// On return `att` is in a terminal state: `Completed` for `Ok`,
    /// `Failed` for `Err`.
    pub async fn process(
        &self,
        method: &str,
        params: &[Value],
        att: &mut RequestAttributes,
    ) -> Result<Value, RelayError> {
        att.transition(RequestState::PreProcessing);

        let handler = match self.pre_process(method, params, att).await {
            Ok(handler) => handler,
            Err(e) => {
                let label = if matches!(e, RelayError::MethodNotFound { .. }) {
                    UNKNOWN_METHOD_LABEL
                } else {
                    method
                };
                att.transition(RequestState::Failed);
                return self.finish(label, Err(e), att);
            }
        };

        att.transition(RequestState::Executing);
        let outcome = handler.execute(params, att).await;
        att.transition(RequestState::PostProcessing);

        let outcome = self.finish(method, outcome, att);
        att.transition(if outcome.is_ok() {
            RequestState::Completed
        } else {
            RequestState::Failed
        });
        outcome
    }

    async fn pre_process(
        &self,
        method: &str,
        params: &[Value],
        att: &mut RequestAttributes,
    ) -> Result<Arc<dyn RequestHandler>, RelayError> {
        let Some(handler) = self.registry.get(method).cloned() else {
            // Unknown methods have no redaction policy, so no values are logged.
            warn!(
                correlation_id = %att.correlation_id,
                method = %method,
                param_count = params.len(),
                "Unknown method"
            );
            return Err(RelayError::MethodNotFound {
                method: method.to_string(),
            });
        };

        let record = AuditRecord::render(handler.as_ref(), params);

        let caller = match self.authenticator.authenticate(&att.credentials).await {
            Ok(caller) => caller,
            Err(e) => {
                warn!(
                    correlation_id = %att.correlation_id,
                    remote_addr = att.credentials.remote_addr.as_deref().unwrap_or("-"),
                    call = %record,
                    error = %e,
                    "Authentication failed"
                );
                return Err(e);
            }
        };
        att.caller = Some(caller);

        info!(
            correlation_id = %att.correlation_id,
            caller = %att.caller_name(),
            remote_addr = att.credentials.remote_addr.as_deref().unwrap_or("-"),
            received_at = %att.received_at.to_rfc3339(),
            call = %record,
            "Method invoked"
        );

        if let Some(caller) = att.caller.as_ref() {
            if let Err(e) = self.authorizer.authorize(caller, method).await {
                warn!(
                    correlation_id = %att.correlation_id,
                    caller = %caller.name,
                    method = %method,
                    "Authorization denied"
                );
                return Err(e);
            }
        }

        Ok(handler)
    }

    /// Log the outcome and record metrics. Returns the outcome unchanged.
    fn finish(
        &self,
        method_label: &str,
        outcome: Result<Value, RelayError>,
        att: &RequestAttributes,
    ) -> Result<Value, RelayError> {
        let elapsed_ms = att.elapsed_ms();

        match &outcome {
            Ok(_) => {
                info!(
                    correlation_id = %att.correlation_id,
                    caller = %att.caller_name(),
                    method = %method_label,
                    elapsed_ms,
                    "Method completed"
                );
            }
            Err(e) => {
                warn!(
                    correlation_id = %att.correlation_id,
                    caller = %att.caller_name(),
                    method = %method_label,
                    error_type = e.error_type_name(),
                    retryable = e.is_retryable(),
                    error = %e,
                    elapsed_ms,
                    "Method failed"
                );
            }
        }

        if let Some(metrics) = &self.metrics {
            let outcome_label = match &outcome {
                Ok(_) => SUCCESS_OUTCOME,
                Err(e) => e.error_type_name(),
            };
            metrics.record(
                method_label,
                outcome_label,
                Duration::from_millis(elapsed_ms),
            );
        }

        outcome
    }
}
