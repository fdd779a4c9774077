//! Shared helpers for integration tests.

pub mod mock_peer;

use rpc_relay::config::{RelayConfig, build_registry};
use rpc_relay::metrics::RelayMetrics;
use rpc_relay::request::RequestPipeline;
use rpc_relay::transport::{PeerClient, RelayServer, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A relay running on an ephemeral port.
pub struct RunningRelay {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningRelay {
    /// Base URL of the JSON-RPC endpoint.
    pub fn rpc_url(&self) -> String {
        format!("http://{}/RPC2", self.addr)
    }

    /// Trigger graceful shutdown and wait for the server to stop.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle
            .await
            .expect("server task")
            .expect("server exits cleanly");
    }
}

/// Parse `yaml`, point the peer at `peer_url`, and start a relay.
pub async fn start_relay(yaml: &str, peer_url: &str) -> RunningRelay {
    let mut config: RelayConfig = serde_yml::from_str(yaml).expect("valid YAML");
    config.peer.url = peer_url.to_string();
    rpc_relay::config::validate(&config).expect("valid config");

    let peer = PeerClient::new(config.peer.peer_config()).expect("peer client");
    let registry = build_registry(&config, Arc::new(peer)).expect("registry");
    let pipeline = RequestPipeline::new(Arc::new(registry))
        .with_metrics(RelayMetrics::new().expect("metrics"));

    let server_config = ServerConfig {
        port: 0,
        ..config.server.server_config()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let (tx, rx) = oneshot::channel::<()>();
    let server = RelayServer::new(server_config, pipeline);
    let handle = tokio::spawn(server.serve(listener, async move {
        let _ = rx.await;
    }));

    RunningRelay {
        addr,
        shutdown: Some(tx),
        handle,
    }
}
