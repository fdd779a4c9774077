//! rpc-relay - JSON-RPC forwarding proxy.
//!
//! Relays configured methods to a peer JSON-RPC server and writes a
//! redacted audit line for every call.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use clap::{Parser, ValueEnum};
use rpc_relay::config::{self, RelayConfig};
use rpc_relay::metrics::RelayMetrics;
use rpc_relay::request::RequestPipeline;
use rpc_relay::transport::{PeerClient, RelayServer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

/// Command line options. Bind address and port override the config file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "RPC_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides server.bind)
    #[arg(short, long, env = "RPC_RELAY_BIND")]
    bind: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "RPC_RELAY_PORT")]
    port: Option<u16>,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn load(cli: &Cli) -> Result<RelayConfig, config::ConfigError> {
    let path = config::find_config_file(cli.config.as_deref())?;
    info!(path = %path.display(), "Loading configuration");

    let mut relay_config = config::load_config(&path)?;
    if let Some(bind) = &cli.bind {
        relay_config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        relay_config.server.port = port;
    }
    config::validate(&relay_config)?;
    Ok(relay_config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Main entry point for rpc-relay.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let relay_config = match load(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let peer_config = relay_config.peer.peer_config();
    info!(
        peer = %peer_config.url,
        timeout_secs = peer_config.timeout.as_secs(),
        connect_timeout_secs = peer_config.connect_timeout.as_secs(),
        authenticated = peer_config.token.is_some(),
        "Peer configured"
    );
    let peer = Arc::new(PeerClient::new(peer_config)?);

    let registry = config::build_registry(&relay_config, peer)?;
    let pipeline = RequestPipeline::new(Arc::new(registry)).with_metrics(RelayMetrics::new()?);

    let server_config = relay_config.server.server_config();
    let listener = TcpListener::bind(server_config.listen_addr()).await?;

    info!(
        bind = %server_config.bind,
        port = server_config.port,
        max_body_bytes = server_config.max_body_bytes,
        max_concurrent_calls = server_config.max_concurrent_calls,
        shutdown_timeout_secs = server_config.shutdown_timeout.as_secs(),
        "rpc-relay starting"
    );

    RelayServer::new(server_config, pipeline)
        .serve(listener, shutdown_signal())
        .await?;

    Ok(())
}
