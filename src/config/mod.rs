//! Relay configuration: YAML schema, loading, and startup wiring.
//!
//! ```yaml
//! server:
//!   port: 2634
//! peer:
//!   url: http://master:2633/RPC2
//!   token: ${PEER_TOKEN:-}
//! methods:
//!   - name: user.chpasswd
//!     hidden: [1]
//!     timeout: 10s
//! ```

pub mod duration_format;
mod error;
mod loader;

pub use error::ConfigError;
pub use loader::{
    CONFIG_ENV_VAR, default_config_paths, find_config_file, load_and_validate, load_config,
    substitute_env_vars, validate,
};

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::proxy::ForwardingProxy;
use crate::registry::MethodRegistry;
use crate::system::VersionRequest;
use crate::transport::peer::{PeerConfig, PeerTransport};
use crate::transport::server::ServerConfig;

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSection,
    /// The server calls are relayed to
    pub peer: PeerSection,
    /// Methods relayed to the peer
    #[serde(default)]
    pub methods: Vec<MethodSection>,
}

/// `server:` block.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "duration_format::deserialize"
    )]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            path: default_path(),
            max_body_bytes: default_max_body_bytes(),
            max_concurrent_calls: default_max_concurrent_calls(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl ServerSection {
    /// Runtime settings for [`RelayServer`](crate::transport::RelayServer).
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind.clone(),
            port: self.port,
            path: self.path.clone(),
            max_body_bytes: self.max_body_bytes,
            max_concurrent_calls: self.max_concurrent_calls,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

fn default_bind() -> String {
    ServerConfig::default().bind
}

fn default_port() -> u16 {
    ServerConfig::default().port
}

fn default_path() -> String {
    ServerConfig::default().path
}

fn default_max_body_bytes() -> usize {
    ServerConfig::default().max_body_bytes
}

fn default_max_concurrent_calls() -> usize {
    ServerConfig::default().max_concurrent_calls
}

fn default_shutdown_timeout() -> Duration {
    ServerConfig::default().shutdown_timeout
}

/// `peer:` block.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerSection {
    pub url: String,
    #[serde(
        default = "default_peer_timeout",
        deserialize_with = "duration_format::deserialize"
    )]
    pub timeout: Duration,
    #[serde(
        default = "default_connect_timeout",
        deserialize_with = "duration_format::deserialize"
    )]
    pub connect_timeout: Duration,
    /// Bearer token for the peer. Empty means none.
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for PeerSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSection")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl PeerSection {
    /// Client settings for [`PeerClient`](crate::transport::PeerClient).
    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            token: self
                .token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            ..PeerConfig::with_url(self.url.clone())
        }
    }
}

fn default_peer_timeout() -> Duration {
    PeerConfig::default().timeout
}

fn default_connect_timeout() -> Duration {
    PeerConfig::default().connect_timeout
}

/// One entry under `methods:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodSection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Zero-based argument positions masked in the audit log
    #[serde(default)]
    pub hidden: Vec<usize>,
    /// Per-method bound on the peer call
    #[serde(default, deserialize_with = "duration_format::deserialize_option")]
    pub timeout: Option<Duration>,
}

/// Build the method table: built-in handlers plus one [`ForwardingProxy`]
/// per configured method, all sharing `peer`.
///
/// # Errors
///
/// Fails if a proxy cannot be created or a name is registered twice.
pub fn build_registry(
    config: &RelayConfig,
    peer: Arc<dyn PeerTransport>,
) -> Result<MethodRegistry, ConfigError> {
    let mut registry = MethodRegistry::new();
    registry.register(Arc::new(VersionRequest::new()))?;

    for entry in &config.methods {
        let mut proxy = ForwardingProxy::new(entry.name.clone(), peer.clone())?;
        if let Some(description) = &entry.description {
            proxy = proxy.with_description(description.clone());
        }
        if let Some(timeout) = entry.timeout {
            proxy = proxy.with_call_timeout(timeout);
        }
        for &position in &entry.hidden {
            proxy.hide_argument(position);
        }

        info!(
            method = %proxy.method_name(),
            hidden = ?proxy.hidden_positions(),
            timeout_ms = entry.timeout.map(|t| t.as_millis() as u64),
            "Registered forwarded method"
        );
        registry.register(Arc::new(proxy))?;
    }

    Ok(registry)
}
