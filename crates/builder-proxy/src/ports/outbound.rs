//! Outbound dependencies of the relay flow.

use std::fmt;

use alloy_consensus::Header;
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Bytes, B256};
use alloy_rpc_types_engine::PayloadId;
use async_trait::async_trait;

use crate::domain::{EngineError, Fork, PayloadEnvelope};

/// Fetches the payload the execution engine is building.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Call the `getPayload` version matching `fork`.
    async fn get_payload(
        &self,
        fork: Fork,
        payload_id: PayloadId,
    ) -> Result<PayloadEnvelope, EngineError>;
}

/// Execution-layer primitives the payload codec is parameterized over.
///
/// Transaction decoding and list-root hashing are format specific; the codec
/// only arranges their results into a block.
pub trait BlockPrimitives: Send + Sync + 'static {
    type Transaction: Clone + fmt::Debug + Send + Sync;

    /// Decode one opaque transaction. The error is a human-readable reason.
    fn decode_transaction(&self, raw: &[u8]) -> Result<Self::Transaction, String>;

    fn encode_transaction(&self, tx: &Self::Transaction) -> Bytes;

    fn transactions_root(&self, txs: &[Self::Transaction]) -> B256;

    fn withdrawals_root(&self, withdrawals: &[Withdrawal]) -> B256;

    fn block_hash(&self, header: &Header) -> B256;
}
