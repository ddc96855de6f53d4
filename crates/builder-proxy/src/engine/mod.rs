//! Engine API plumbing: JSON-RPC envelopes, the outbound client, JWT
//! authentication and the call interceptor.

pub mod client;
pub mod interceptor;
pub mod jwt;

pub use client::EngineClient;
pub use interceptor::EngineCallInterceptor;
pub use jwt::JwtProvider;

use serde::{Deserialize, Serialize};

/// Prefix shared by every Engine API method
pub const ENGINE_NAMESPACE: &str = "engine_";

pub const FORKCHOICE_UPDATED_V1: &str = "engine_forkchoiceUpdatedV1";
pub const FORKCHOICE_UPDATED_V2: &str = "engine_forkchoiceUpdatedV2";
pub const FORKCHOICE_UPDATED_V3: &str = "engine_forkchoiceUpdatedV3";

pub const GET_PAYLOAD_V1: &str = "engine_getPayloadV1";
pub const GET_PAYLOAD_V2: &str = "engine_getPayloadV2";
pub const GET_PAYLOAD_V3: &str = "engine_getPayloadV3";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub id: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Positional parameter `index`, if params is an array that long.
    pub fn param(&self, index: usize) -> Option<&serde_json::Value> {
        self.params.as_array()?.get(index)
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse<T = serde_json::Value> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let req = JsonRpcRequest::new(GET_PAYLOAD_V1, serde_json::json!(["0x01"]), 7);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "engine_getPayloadV1");
        assert_eq!(json["id"], 7);
        assert_eq!(req.param(0).unwrap(), "0x01");
        assert!(req.param(1).is_none());
    }

    #[test]
    fn test_request_without_params_parses() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"eth_chainId","id":1}"#).unwrap();
        assert!(req.param(0).is_none());
        assert!(!req.method.starts_with(ENGINE_NAMESPACE));
    }
}
