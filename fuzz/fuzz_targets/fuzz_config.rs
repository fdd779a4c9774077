#![no_main]

//! Fuzz target for configuration parsing.
//!
//! Arbitrary YAML must either fail to parse, fail validation, or produce a
//! configuration from which a registry can be built.

use libfuzzer_sys::fuzz_target;

use rpc_relay::config::{RelayConfig, validate};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = serde_yml::from_str::<RelayConfig>(text) else {
        return;
    };
    if validate(&config).is_ok() {
        let _ = config.server.server_config().listen_addr();
        let _ = config.peer.peer_config();
    }
});
