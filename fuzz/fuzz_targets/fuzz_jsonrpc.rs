#![no_main]

//! Fuzz target for inbound JSON-RPC decoding and audit rendering.
//!
//! # Goal
//! Malformed payloads must not panic the decoder, and every hidden
//! position of a decoded call must render as the placeholder.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};

use rpc_relay::request::{AuditRecord, REDACTED_PLACEHOLDER, RenderedArg};
use rpc_relay::transport::jsonrpc::parse_call;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// Raw bytes fed straight to the decoder
    raw_bytes: Vec<u8>,
    /// Structured call built from fuzzed parts
    structured: Option<StructuredCall>,
    /// Bitmask of hidden positions
    hidden_mask: u16,
}

#[derive(Arbitrary, Debug)]
struct StructuredCall {
    id: Option<i64>,
    method: String,
    params: Vec<FuzzParam>,
    named: bool,
}

#[derive(Arbitrary, Debug)]
enum FuzzParam {
    Int(i64),
    Bool(bool),
    Text(String),
    Null,
}

impl FuzzParam {
    fn to_value(&self) -> Value {
        match self {
            FuzzParam::Int(i) => json!(i),
            FuzzParam::Bool(b) => json!(b),
            FuzzParam::Text(s) => json!(s),
            FuzzParam::Null => Value::Null,
        }
    }
}

fn check(bytes: &[u8], hidden_mask: u16) {
    let Ok(call) = parse_call(bytes) else {
        return;
    };
    let hidden = |i: usize| i < 16 && hidden_mask & (1 << i) != 0;
    let record = AuditRecord::from_params(&call.method, &call.params, hidden);

    assert_eq!(record.args().len(), call.params.len());
    for (i, (arg, param)) in record.args().iter().zip(&call.params).enumerate() {
        match arg {
            RenderedArg::Hidden => assert!(hidden(i)),
            RenderedArg::Shown(text) => {
                assert!(!hidden(i));
                assert_eq!(text, &param.to_string());
                assert_ne!(text, REDACTED_PLACEHOLDER);
            }
        }
    }
    let _ = record.to_string();
}

fuzz_target!(|input: FuzzInput| {
    check(&input.raw_bytes, input.hidden_mask);

    if let Some(call) = input.structured {
        let params: Vec<Value> = call.params.iter().map(FuzzParam::to_value).collect();
        let params = if call.named {
            Value::Object(
                params
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (format!("p{}", i), v))
                    .collect(),
            )
        } else {
            Value::Array(params)
        };
        let mut body = json!({"jsonrpc": "2.0", "method": call.method, "params": params});
        if let Some(id) = call.id {
            body["id"] = json!(id);
        }
        check(body.to_string().as_bytes(), input.hidden_mask);
    }
});
