// SPDX-License-Identifier: Apache-2.0
//! protocol
//!
//! Layer: Domain
//! Purpose:
//! - JSONL bridge protocol spoken by the façade server to its own clients
//!
//! Notes:
//! - One JSON object per line, tagged by "type".

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Requests sent *to* the bridge (from clients).
///
/// We use serde's "tag" representation:
/// { "type": "call", "id": 1, "method": "get_self_wxid", "params": [] }
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// handshake ack sent by client after receiving ServerResponse::Hello
    HelloAck { client: String, protocol: String },

    /// Simple liveness test
    Ping { id: u64 },

    /// invoke one allow-listed engine method with positional params
    Call {
        id: u64,
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },

    /// start pushing chat messages to this connection
    MessageEnable { id: u64 },

    /// stop pushing chat messages to this connection
    MessageDisable { id: u64 },

    /// include (or exclude) the moments feed in pushed messages
    RecvPyq { id: u64, enabled: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerResponse {
    /// handshake greeting sent immediately on connect
    Hello {
        version: String,
        features: Vec<String>,
        server_name: String,
    },

    /// Ping response
    Pong { id: u64 },

    /// successful call (or subscription change) result
    Result { id: u64, result: Value },

    /// Failed call, or a protocol/parsing error when `id` is absent
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        message: String,
        code: i32,
    },

    /// pushed chat message
    Message { data: Value },
}

/// Error codes carried by `ServerResponse::Error`.
pub mod code {
    /// the engine call failed
    pub const EXECUTION: i32 = -1;
    /// subscribing/unsubscribing to pushed messages failed
    pub const SUBSCRIPTION: i32 = -2;
    /// method not allow-listed, or params do not fit it
    pub const REJECTED: i32 = -3;
    /// unparseable request line
    pub const PROTOCOL: i32 = -32700;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_params_default_to_empty() {
        let req: ClientRequest =
            serde_json::from_str(r#"{"type":"call","id":3,"method":"is_login"}"#).unwrap();
        match req {
            ClientRequest::Call { id, method, params } => {
                assert_eq!(id, 3);
                assert_eq!(method, "is_login");
                assert!(params.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn protocol_errors_omit_the_id() {
        let line = serde_json::to_string(&ServerResponse::Error {
            id: None,
            message: "bad".into(),
            code: code::PROTOCOL,
        })
        .unwrap();
        assert_eq!(line, r#"{"type":"error","message":"bad","code":-32700}"#);
    }
}
