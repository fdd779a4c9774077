//! Method registration table.
//!
//! Built once at startup, then frozen behind an `Arc` and only read. The
//! pipeline resolves every inbound call with a single map lookup.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::RelayError;
use crate::request::RequestHandler;

/// Maps method names to their handlers.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own method name.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Configuration` if the name is already taken.
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>) -> Result<(), RelayError> {
        let name = handler.method_name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(RelayError::Configuration {
                details: format!("method '{}' is registered twice", name),
            });
        }
        debug!(method = %name, description = handler.description(), "Registered method");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Look up the handler for `method`.
    pub fn get(&self, method: &str) -> Option<&Arc<dyn RequestHandler>> {
        self.handlers.get(method)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}
