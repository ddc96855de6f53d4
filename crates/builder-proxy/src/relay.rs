//! Relay HTTP handlers.
//!
//! The builder API surface the consensus client talks to when it believes
//! an external relay is configured:
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /eth/v1/builder/status` | [`status`] |
//! | `POST /eth/v1/builder/validators` | [`register_validators`] |
//! | `GET /eth/v1/builder/header/:slot/:parent_hash/:pubkey` | [`get_header`] |
//! | `POST /eth/v1/builder/blinded_blocks` | [`submit_blinded_block`] |
//!
//! Bids are synthesized from whatever payload the execution engine is
//! building for the pending payload id; the offered payload is then held in
//! [`BuildState`] until a blinded block claims it.

use std::sync::Arc;

use alloy_primitives::B256;
use alloy_rpc_types_engine::BlobsBundleV1;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{debug, info, warn};

use crate::bid::BidBuilder;
use crate::codec::PayloadCodec;
use crate::domain::{
    BeaconExecutionPayload, BlsPubkey, BuildState, CachedBuild, ChainConfig, Fork,
    PayloadResponseEnvelope, RelayError, RevealedPayload, SignedBidEnvelope,
    SignedBlindedBeaconBlock, SignedValidatorRegistrationJson, ValidatorRegistration,
    ValidatorRegistry, VersionedResponse,
};
use crate::middleware::{RelayMetrics, RelayOperation, RequestTimer};
use crate::ports::PayloadSource;

/// Every relay route lives under this prefix; nothing under it is forwarded.
pub const BUILDER_PATH_PREFIX: &str = "/eth/v1/builder/";

/// Blinded blocks carry full beacon bodies; registrations arrive in bulk.
pub const MAX_RELAY_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Everything the relay handlers share.
pub struct RelayContext {
    pub chain: ChainConfig,
    pub state: Arc<BuildState>,
    pub registry: Arc<ValidatorRegistry>,
    pub source: Arc<dyn PayloadSource>,
    pub codec: PayloadCodec,
    pub bids: BidBuilder,
    pub metrics: Arc<RelayMetrics>,
}

/// Relay routes with their state applied.
pub fn routes(ctx: Arc<RelayContext>) -> Router {
    Router::new()
        .route("/eth/v1/builder/status", get(status))
        .route("/eth/v1/builder/validators", post(register_validators))
        .route(
            "/eth/v1/builder/header/:slot/:parent_hash/:pubkey",
            get(get_header),
        )
        .route("/eth/v1/builder/blinded_blocks", post(submit_blinded_block))
        .layer(DefaultBodyLimit::max(MAX_RELAY_BODY_BYTES))
        .with_state(ctx)
}

/// Validated path parameters of a header request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRequest {
    pub slot: u64,
    pub parent_hash: B256,
    pub pubkey: BlsPubkey,
}

impl HeaderRequest {
    pub fn parse(slot: &str, parent_hash: &str, pubkey: &str) -> Result<Self, RelayError> {
        let slot = slot
            .parse::<u64>()
            .map_err(|e| RelayError::bad_request(format!("invalid slot {slot:?}: {e}")))?;
        let parent_hash = parent_hash.parse::<B256>().map_err(|e| {
            RelayError::bad_request(format!("invalid parent hash {parent_hash:?}: {e}"))
        })?;
        let pubkey = pubkey
            .parse::<BlsPubkey>()
            .map_err(|e| RelayError::bad_request(format!("invalid pubkey {pubkey:?}: {e}")))?;
        Ok(Self {
            slot,
            parent_hash,
            pubkey,
        })
    }
}

impl RelayContext {
    /// Fetch the pending payload, rebuild it as ours, sign a bid for it and
    /// hold it for the reveal.
    pub async fn build_header(
        &self,
        request: &HeaderRequest,
    ) -> Result<SignedBidEnvelope, RelayError> {
        let fork = self.chain.fork_at_slot(request.slot);
        if self.registry.lookup(&request.pubkey).is_none() {
            debug!(pubkey = %request.pubkey, "header requested by unregistered validator");
        }

        let payload_id = self
            .state
            .pending_payload_id()
            .ok_or(RelayError::NoPayloadId)?;
        info!(slot = request.slot, %fork, ?payload_id, "fetching payload for bid");

        let fetched = self.source.get_payload(fork, payload_id).await?;
        if !self.state.consume_payload_id(payload_id) {
            debug!(?payload_id, "payload id replaced while fetching");
        }
        if fetched.payload.as_v1().parent_hash != request.parent_hash {
            debug!(
                requested = %request.parent_hash,
                building_on = %fetched.payload.as_v1().parent_hash,
                "engine payload builds on a different parent"
            );
        }

        let parent_beacon_root = match fork {
            Fork::Deneb => {
                let root = self.state.parent_beacon_root();
                if root.is_none() {
                    warn!(slot = request.slot, "no parent beacon block root cached");
                }
                root
            }
            Fork::Bellatrix | Fork::Capella => None,
        };

        let envelope = self.codec.rebuild(fetched, parent_beacon_root)?;
        let bid = self.bids.build_bid(&envelope)?;
        info!(
            slot = request.slot,
            %fork,
            block_hash = %envelope.payload.block_hash(),
            value = %bid.data.message.value,
            "serving bid"
        );

        self.state.cache_payload(CachedBuild {
            slot: request.slot,
            envelope,
        });
        Ok(bid)
    }

    /// Hand out the payload behind the last bid, clearing it.
    pub fn reveal(
        &self,
        block: &SignedBlindedBeaconBlock,
    ) -> Result<PayloadResponseEnvelope, RelayError> {
        let cached = self
            .state
            .take_cached_payload()
            .ok_or(RelayError::NoCachedPayload)?;
        let fork = cached.fork();
        let block_hash = cached.envelope.payload.block_hash();

        if block.message.slot != cached.slot {
            warn!(
                block_slot = block.message.slot,
                bid_slot = cached.slot,
                "blinded block slot differs from bid slot"
            );
        }
        if let Some(committed) = block.message.payload_block_hash() {
            if committed != block_hash {
                warn!(%committed, cached = %block_hash, "blinded block commits to another payload");
            }
        }

        let execution_payload = BeaconExecutionPayload::from(&cached.envelope.payload);
        let data = match (fork.has_blobs(), cached.envelope.blobs_bundle) {
            (true, bundle) => RevealedPayload::WithBlobs {
                execution_payload,
                blobs_bundle: bundle.unwrap_or_else(empty_blobs_bundle),
            },
            (false, _) => RevealedPayload::Payload(execution_payload),
        };
        info!(slot = cached.slot, %fork, %block_hash, "revealing payload");

        Ok(VersionedResponse {
            version: fork,
            data,
        })
    }
}

fn empty_blobs_bundle() -> BlobsBundleV1 {
    BlobsBundleV1 {
        commitments: vec![],
        proofs: vec![],
        blobs: vec![],
    }
}

/// `GET /eth/v1/builder/status`
pub async fn status() -> StatusCode {
    StatusCode::OK
}

/// `POST /eth/v1/builder/validators`
///
/// Signatures are not verified.
pub async fn register_validators(
    State(ctx): State<Arc<RelayContext>>,
    body: Bytes,
) -> Result<StatusCode, RelayError> {
    let registrations: Vec<SignedValidatorRegistrationJson> = serde_json::from_slice(&body)
        .map_err(|e| RelayError::bad_request(format!("invalid registrations: {e}")))?;

    let mut result = Ok(StatusCode::OK);
    for raw in &registrations {
        match ValidatorRegistration::try_from(raw) {
            Ok(registration) => {
                ctx.registry.register(registration);
            }
            Err(e) => {
                result = Err(RelayError::Internal(format!("registration rejected: {e}")));
                break;
            }
        }
    }

    ctx.metrics.set_validators_registered(ctx.registry.len());
    info!(
        submitted = registrations.len(),
        known = ctx.registry.len(),
        "validator registrations processed"
    );
    result
}

/// `GET /eth/v1/builder/header/:slot/:parent_hash/:pubkey`
pub async fn get_header(
    State(ctx): State<Arc<RelayContext>>,
    Path((slot, parent_hash, pubkey)): Path<(String, String, String)>,
) -> Result<Json<SignedBidEnvelope>, RelayError> {
    let timer = RequestTimer::new(Arc::clone(&ctx.metrics), RelayOperation::Header);
    let result = match HeaderRequest::parse(&slot, &parent_hash, &pubkey) {
        Ok(request) => ctx.build_header(&request).await,
        Err(e) => Err(e),
    };
    timer.finish(result.is_ok());
    result.map(Json)
}

/// `POST /eth/v1/builder/blinded_blocks`
pub async fn submit_blinded_block(
    State(ctx): State<Arc<RelayContext>>,
    body: Bytes,
) -> Result<Json<PayloadResponseEnvelope>, RelayError> {
    let timer = RequestTimer::new(Arc::clone(&ctx.metrics), RelayOperation::Reveal);
    let result = serde_json::from_slice::<SignedBlindedBeaconBlock>(&body)
        .map_err(|e| RelayError::bad_request(format!("invalid blinded block: {e}")))
        .and_then(|block| ctx.reveal(&block));
    timer.finish(result.is_ok());
    result.map(Json)
}
