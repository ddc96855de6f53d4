//! Outbound Engine API client.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::U256;
use alloy_rpc_types_engine::{
    ExecutionPayloadEnvelopeV3, ExecutionPayloadV1, ExecutionPayloadV2, PayloadId,
};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::jwt::JwtProvider;
use super::{JsonRpcRequest, JsonRpcResponse, GET_PAYLOAD_V1, GET_PAYLOAD_V2, GET_PAYLOAD_V3};
use crate::domain::{EngineError, ExecutionPayload, Fork, PayloadEnvelope};
use crate::ports::PayloadSource;

/// `engine_getPayloadV2` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPayloadV2Response {
    pub execution_payload: ExecutionPayloadV2,
    pub block_value: U256,
}

/// JSON-RPC client bound to one execution engine.
pub struct EngineClient {
    http: reqwest::Client,
    url: Url,
    jwt: Option<Arc<JwtProvider>>,
    next_id: AtomicU64,
}

impl EngineClient {
    pub fn new(http: reqwest::Client, url: Url, jwt: Option<Arc<JwtProvider>>) -> Self {
        Self {
            http,
            url,
            jwt,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Attach a bearer token when a JWT secret is configured.
    pub async fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder, EngineError> {
        match &self.jwt {
            Some(provider) => Ok(builder.bearer_auth(provider.token().await?)),
            None => Ok(builder),
        }
    }

    pub fn has_jwt(&self) -> bool {
        self.jwt.is_some()
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, EngineError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(method, serde_json::to_value(params)?, id);
        debug!(method, id, "calling execution engine");

        let builder = self.authorize(self.http.post(self.url.clone()).json(&req)).await?;
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let parsed: JsonRpcResponse<R> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => return Err(EngineError::Status(status.as_u16())),
            Err(e) => return Err(e.into()),
        };
        if let Some(err) = parsed.error {
            return Err(EngineError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        parsed.result.ok_or(EngineError::MissingResult)
    }

    pub async fn get_payload_v1(&self, id: PayloadId) -> Result<ExecutionPayloadV1, EngineError> {
        self.request(GET_PAYLOAD_V1, [id]).await
    }

    pub async fn get_payload_v2(&self, id: PayloadId) -> Result<GetPayloadV2Response, EngineError> {
        self.request(GET_PAYLOAD_V2, [id]).await
    }

    pub async fn get_payload_v3(
        &self,
        id: PayloadId,
    ) -> Result<ExecutionPayloadEnvelopeV3, EngineError> {
        self.request(GET_PAYLOAD_V3, [id]).await
    }
}

impl fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineClient")
            .field("url", &self.url.as_str())
            .field("jwt", &self.jwt.is_some())
            .finish()
    }
}

#[async_trait]
impl PayloadSource for EngineClient {
    async fn get_payload(
        &self,
        fork: Fork,
        payload_id: PayloadId,
    ) -> Result<PayloadEnvelope, EngineError> {
        let envelope = match fork {
            Fork::Bellatrix => PayloadEnvelope {
                payload: ExecutionPayload::Bellatrix(self.get_payload_v1(payload_id).await?),
                block_value: U256::ZERO,
                blobs_bundle: None,
            },
            Fork::Capella => {
                let resp = self.get_payload_v2(payload_id).await?;
                PayloadEnvelope {
                    payload: ExecutionPayload::Capella(resp.execution_payload),
                    block_value: resp.block_value,
                    blobs_bundle: None,
                }
            }
            Fork::Deneb => {
                let resp = self.get_payload_v3(payload_id).await?;
                PayloadEnvelope {
                    payload: ExecutionPayload::Deneb(resp.execution_payload),
                    block_value: resp.block_value,
                    blobs_bundle: Some(resp.blobs_bundle),
                }
            }
        };
        Ok(envelope)
    }
}
