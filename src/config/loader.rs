//! Configuration loading and validation.
//!
//! Flow: locate file → read → substitute `${VAR}` → parse YAML → validate.

use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use super::RelayConfig;
use super::error::ConfigError;
use crate::system::VersionRequest;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "RPC_RELAY_CONFIG";

/// Routes the server owns regardless of configuration.
const BUILTIN_ROUTES: &[&str] = &["/health", "/metrics"];

/// Configuration file search paths, in priority order.
///
/// An explicit `--config` path takes precedence over all of these.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("/etc/rpc-relay/config.yaml"));
    paths.push(PathBuf::from("./config.yaml"));

    paths
}

/// Find the config file: `explicit_path` if given, else the first existing
/// default path.
pub fn find_config_file(explicit_path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ConfigFileNotFound {
            searched: vec![path.to_path_buf()],
        });
    }

    let paths = default_config_paths();
    match paths.iter().find(|p| p.exists()) {
        Some(path) => Ok(path.clone()),
        None => Err(ConfigError::ConfigFileNotFound { searched: paths }),
    }
}

/// Read and parse a config file. Does not validate.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Err(ConfigError::EmptyConfigFile);
    }

    let contents = substitute_env_vars(&contents)?;
    let config: RelayConfig = serde_yml::from_str(&contents)?;

    debug!(path = %path.display(), methods = config.methods.len(), "Loaded configuration");
    Ok(config)
}

/// Load, then validate.
pub fn load_and_validate(path: &Path) -> Result<RelayConfig, ConfigError> {
    let config = load_config(path)?;
    validate(&config)?;
    Ok(config)
}

// ${VAR} and ${VAR:-default}
static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
});

/// Replace `${VAR}` and `${VAR:-default}` with values from the environment.
///
/// # Errors
///
/// `MissingEnvVar` for the first `${VAR}` with no default that is unset.
pub fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing: Option<String> = None;

    let substituted = ENV_VAR_PATTERN.replace_all(content, |caps: &Captures<'_>| {
        let var = &caps[1];
        match (std::env::var(var), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| var.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::MissingEnvVar { var }),
        None => Ok(substituted.into_owned()),
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate(config: &RelayConfig) -> Result<(), ConfigError> {
    let url = &config.peer.url;
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => {
            return Err(ConfigError::InvalidUrl {
                url: url.clone(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Err(e) => {
            return Err(ConfigError::InvalidUrl {
                url: url.clone(),
                message: e.to_string(),
            });
        }
    }

    let path = &config.server.path;
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidPath {
            path: path.clone(),
            message: "must start with '/'".to_string(),
        });
    }
    if BUILTIN_ROUTES.contains(&path.as_str()) {
        return Err(ConfigError::InvalidPath {
            path: path.clone(),
            message: "collides with a built-in route".to_string(),
        });
    }

    if config.server.max_body_bytes == 0 {
        return Err(ConfigError::ZeroLimit {
            field: "server.max_body_bytes",
        });
    }
    if config.server.max_concurrent_calls == 0 {
        return Err(ConfigError::ZeroLimit {
            field: "server.max_concurrent_calls",
        });
    }

    let mut seen = HashSet::new();
    for (index, method) in config.methods.iter().enumerate() {
        if method.name.is_empty() {
            return Err(ConfigError::EmptyMethodName { index });
        }
        if method.name == VersionRequest::METHOD {
            return Err(ConfigError::ReservedMethod {
                name: method.name.clone(),
            });
        }
        if !seen.insert(method.name.as_str()) {
            return Err(ConfigError::DuplicateMethod {
                name: method.name.clone(),
            });
        }
    }

    Ok(())
}
