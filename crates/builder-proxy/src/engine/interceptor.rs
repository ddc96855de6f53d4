//! Engine call interceptor.
//!
//! Observes forwarded Engine API exchanges and records what the relay flow
//! needs later: the payload id handed out by a forkchoice update, and the
//! parent beacon block root carried by V3 payload attributes. It never
//! changes the exchange and never fails it.

use std::sync::Arc;

use alloy_primitives::B64;
use alloy_rpc_types_engine::{ForkchoiceUpdated, PayloadAttributes};
use tracing::{debug, info, warn};

use super::{
    JsonRpcRequest, JsonRpcResponse, ENGINE_NAMESPACE, FORKCHOICE_UPDATED_V1,
    FORKCHOICE_UPDATED_V2, FORKCHOICE_UPDATED_V3,
};
use crate::domain::BuildState;
use crate::middleware::RelayMetrics;

#[derive(Clone)]
pub struct EngineCallInterceptor {
    state: Arc<BuildState>,
    metrics: Arc<RelayMetrics>,
}

impl EngineCallInterceptor {
    pub fn new(state: Arc<BuildState>, metrics: Arc<RelayMetrics>) -> Self {
        Self { state, metrics }
    }

    /// Inspect one forwarded request/response pair.
    pub fn inspect(&self, request: &[u8], response: &[u8]) {
        let call: JsonRpcRequest = match serde_json::from_slice(request) {
            Ok(call) => call,
            Err(e) => {
                debug!(error = %e, "forwarded body is not a single JSON-RPC call");
                return;
            }
        };
        if !call.method.starts_with(ENGINE_NAMESPACE) {
            return;
        }
        self.metrics.record_engine_call();

        match call.method.as_str() {
            FORKCHOICE_UPDATED_V1 | FORKCHOICE_UPDATED_V2 => {
                self.observe_forkchoice_response(&call.method, response);
            }
            FORKCHOICE_UPDATED_V3 => {
                self.observe_payload_attributes(&call);
                self.observe_forkchoice_response(&call.method, response);
            }
            _ => {}
        }
    }

    fn observe_forkchoice_response(&self, method: &str, response: &[u8]) {
        let parsed: JsonRpcResponse<ForkchoiceUpdated> = match serde_json::from_slice(response) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(method, error = %e, "could not parse forkchoice response");
                return;
            }
        };
        let Some(update) = parsed.result else {
            if let Some(err) = parsed.error {
                debug!(method, code = err.code, message = %err.message, "forkchoice update failed");
            }
            return;
        };

        info!(
            method,
            status = ?update.payload_status.status,
            latest_valid_hash = ?update.payload_status.latest_valid_hash,
            payload_id = ?update.payload_id,
            "observed forkchoice update"
        );

        match update.payload_id {
            Some(id) if id.0 != B64::ZERO => {
                if let Some(previous) = self.state.set_payload_id(id) {
                    debug!(?previous, "replacing pending payload id");
                }
                self.metrics.record_payload_id();
            }
            _ => {}
        }
    }

    fn observe_payload_attributes(&self, call: &JsonRpcRequest) {
        let Some(raw) = call.param(1) else {
            return;
        };
        match serde_json::from_value::<Option<PayloadAttributes>>(raw.clone()) {
            Ok(Some(attrs)) => {
                if let Some(root) = attrs.parent_beacon_block_root {
                    debug!(%root, "caching parent beacon block root");
                    self.state.set_parent_beacon_root(root);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not parse V3 payload attributes"),
        }
    }
}
