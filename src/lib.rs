//! rpc-relay - JSON-RPC forwarding proxy with argument redaction.
//!
//! Selected methods are relayed verbatim to a peer server. Every call is
//! audited, and arguments configured as sensitive are masked in the audit
//! trail while still being forwarded untouched.
//!
//! # Call Path
//!
//! - **Inbound:** `transport::server` decodes one JSON-RPC call per request.
//! - **Lifecycle:** `request::RequestPipeline` looks up the handler, writes
//!   the redacted audit line, authenticates, authorizes, and executes.
//! - **Forwarding:** `proxy::ForwardingProxy` re-issues the call through a
//!   `transport::PeerTransport` and returns the peer's answer unchanged.

pub mod config;
pub mod error;
pub mod metrics;
pub mod proxy;
pub mod registry;
pub mod request;
pub mod system;
pub mod timeout;
pub mod transport;
