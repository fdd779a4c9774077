//! Redacted call records for audit logs.
//!
//! Every argument is rendered as compact JSON unless the handler marks its
//! position hidden, in which case the fixed [`REDACTED_PLACEHOLDER`] is
//! emitted instead. Because shown strings keep their JSON quotes, an
//! argument whose value is literally `***` renders as `"***"` and can never
//! be mistaken for a masked one.

use serde_json::Value;
use std::fmt;

use super::RequestHandler;

/// Marker printed in place of a hidden argument.
pub const REDACTED_PLACEHOLDER: &str = "***";

/// One argument as it appears in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedArg {
    /// Compact JSON text of the argument
    Shown(String),
    /// Masked argument
    Hidden,
}

impl fmt::Display for RenderedArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedArg::Shown(text) => f.write_str(text),
            RenderedArg::Hidden => f.write_str(REDACTED_PLACEHOLDER),
        }
    }
}

/// Log-safe rendering of one call: method name plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    method: String,
    args: Vec<RenderedArg>,
}

impl AuditRecord {
    /// Render `params` for `handler`, asking it about each position.
    pub fn render(handler: &dyn RequestHandler, params: &[Value]) -> Self {
        Self::from_params(handler.method_name(), params, |i| handler.is_hidden(i))
    }

    /// Render `params` with an explicit hidden-position predicate.
    pub fn from_params(method: &str, params: &[Value], is_hidden: impl Fn(usize) -> bool) -> Self {
        let args = params
            .iter()
            .enumerate()
            .map(|(position, value)| {
                if is_hidden(position) {
                    RenderedArg::Hidden
                } else {
                    RenderedArg::Shown(value.to_string())
                }
            })
            .collect();

        Self {
            method: method.to_string(),
            args,
        }
    }

    /// Method name of the recorded call.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Rendered arguments, in call order.
    pub fn args(&self) -> &[RenderedArg] {
        &self.args
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}
