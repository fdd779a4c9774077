//! Wire-facing code: inbound server, outbound peer client, JSON-RPC types.

pub mod jsonrpc;
pub mod peer;
pub mod server;

pub use jsonrpc::{
    InboundCall, JsonRpcId, JsonRpcRequest, JsonRpcResponse, RejectedCall, parse_call,
};
pub use peer::{PeerClient, PeerConfig, PeerTransport};
pub use server::{RelayServer, ServerConfig};
