//! Fork-tagged payloads and the builder-API wire types.
//!
//! Engine API types (camelCase, hex quantities) come from
//! `alloy-rpc-types-engine`. The builder API speaks the beacon JSON dialect
//! (snake_case, decimal strings), which is modeled here.

use std::fmt;

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, Bloom, Bytes, FixedBytes, B256, U256};
use alloy_rpc_types_engine::{
    BlobsBundleV1, ExecutionPayloadV1, ExecutionPayloadV2, ExecutionPayloadV3,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

/// BLS public key as carried on the wire
pub type BlsPubkey = FixedBytes<48>;

/// BLS signature as carried on the wire
pub type BlsSignatureBytes = FixedBytes<96>;

/// KZG commitment to a blob
pub type KzgCommitment = FixedBytes<48>;

/// Protocol fork, in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fork {
    /// Pre-withdrawal payloads
    Bellatrix,
    /// Payloads with withdrawals
    Capella,
    /// Payloads with withdrawals and blobs
    Deneb,
}

impl Fork {
    /// Version tag used in builder-API envelopes
    pub const fn name(&self) -> &'static str {
        match self {
            Fork::Bellatrix => "bellatrix",
            Fork::Capella => "capella",
            Fork::Deneb => "deneb",
        }
    }

    pub const fn has_blobs(&self) -> bool {
        matches!(self, Fork::Deneb)
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine API execution payload, tagged by fork.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPayload {
    Bellatrix(ExecutionPayloadV1),
    Capella(ExecutionPayloadV2),
    Deneb(ExecutionPayloadV3),
}

impl ExecutionPayload {
    pub fn fork(&self) -> Fork {
        match self {
            ExecutionPayload::Bellatrix(_) => Fork::Bellatrix,
            ExecutionPayload::Capella(_) => Fork::Capella,
            ExecutionPayload::Deneb(_) => Fork::Deneb,
        }
    }

    /// Fields shared by every fork
    pub fn as_v1(&self) -> &ExecutionPayloadV1 {
        match self {
            ExecutionPayload::Bellatrix(p) => p,
            ExecutionPayload::Capella(p) => &p.payload_inner,
            ExecutionPayload::Deneb(p) => &p.payload_inner.payload_inner,
        }
    }

    /// `None` means the fork has no withdrawals, which differs from an empty list.
    pub fn withdrawals(&self) -> Option<&[Withdrawal]> {
        match self {
            ExecutionPayload::Bellatrix(_) => None,
            ExecutionPayload::Capella(p) => Some(&p.withdrawals),
            ExecutionPayload::Deneb(p) => Some(&p.payload_inner.withdrawals),
        }
    }

    /// `(blob_gas_used, excess_blob_gas)` for blob-carrying payloads
    pub fn blob_gas(&self) -> Option<(u64, u64)> {
        match self {
            ExecutionPayload::Deneb(p) => Some((p.blob_gas_used, p.excess_blob_gas)),
            _ => None,
        }
    }

    pub fn block_hash(&self) -> B256 {
        self.as_v1().block_hash
    }
}

/// A payload as the engine reported it, or as the codec rebuilt it.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEnvelope {
    pub payload: ExecutionPayload,
    /// Value reported by the engine, in wei
    pub block_value: U256,
    /// Present only for blob-carrying payloads
    pub blobs_bundle: Option<BlobsBundleV1>,
}

impl PayloadEnvelope {
    pub fn fork(&self) -> Fork {
        self.payload.fork()
    }
}

/// Builder-API response wrapper: `{"version": <fork>, "data": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedResponse<T> {
    pub version: Fork,
    pub data: T,
}

/// Execution payload header committed to by a bid.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub prev_randao: B256,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub gas_limit: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub gas_used: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    #[serde_as(as = "DisplayFromStr")]
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    pub transactions_root: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
}

/// The bid message a builder signs.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderBid {
    pub header: ExecutionPayloadHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_kzg_commitments: Option<Vec<KzgCommitment>>,
    #[serde_as(as = "DisplayFromStr")]
    pub value: U256,
    pub pubkey: BlsPubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignatureBytes,
}

/// Response body of `GET /eth/v1/builder/header/...`
pub type SignedBidEnvelope = VersionedResponse<SignedBuilderBid>;

/// Withdrawal in beacon JSON form
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconWithdrawal {
    #[serde_as(as = "DisplayFromStr")]
    pub index: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub validator_index: u64,
    pub address: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: u64,
}

impl From<&Withdrawal> for BeaconWithdrawal {
    fn from(w: &Withdrawal) -> Self {
        Self {
            index: w.index,
            validator_index: w.validator_index,
            address: w.address,
            amount: w.amount,
        }
    }
}

/// Full execution payload in beacon JSON form.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconExecutionPayload {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub prev_randao: B256,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub gas_limit: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub gas_used: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    #[serde_as(as = "DisplayFromStr")]
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    pub transactions: Vec<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<BeaconWithdrawal>>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
}

impl From<&ExecutionPayload> for BeaconExecutionPayload {
    fn from(payload: &ExecutionPayload) -> Self {
        let p = payload.as_v1();
        let blob_gas = payload.blob_gas();
        Self {
            parent_hash: p.parent_hash,
            fee_recipient: p.fee_recipient,
            state_root: p.state_root,
            receipts_root: p.receipts_root,
            logs_bloom: p.logs_bloom,
            prev_randao: p.prev_randao,
            block_number: p.block_number,
            gas_limit: p.gas_limit,
            gas_used: p.gas_used,
            timestamp: p.timestamp,
            extra_data: p.extra_data.clone(),
            base_fee_per_gas: p.base_fee_per_gas,
            block_hash: p.block_hash,
            transactions: p.transactions.clone(),
            withdrawals: payload
                .withdrawals()
                .map(|ws| ws.iter().map(BeaconWithdrawal::from).collect()),
            blob_gas_used: blob_gas.map(|(used, _)| used),
            excess_blob_gas: blob_gas.map(|(_, excess)| excess),
        }
    }
}

/// Revealed payload: bare before Deneb, bundled with blobs after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevealedPayload {
    WithBlobs {
        execution_payload: BeaconExecutionPayload,
        blobs_bundle: BlobsBundleV1,
    },
    Payload(BeaconExecutionPayload),
}

/// Response body of `POST /eth/v1/builder/blinded_blocks`
pub type PayloadResponseEnvelope = VersionedResponse<RevealedPayload>;

/// Signed blinded beacon block, decoded only as far as the proxy needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedBlindedBeaconBlock {
    pub message: BlindedBeaconBlock,
    pub signature: BlsSignatureBytes,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct BlindedBeaconBlock {
    #[serde_as(as = "DisplayFromStr")]
    pub slot: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub proposer_index: u64,
    pub parent_root: B256,
    pub state_root: B256,
    pub body: serde_json::Value,
}

impl BlindedBeaconBlock {
    /// Block hash of the execution payload header inside the body, if present.
    pub fn payload_block_hash(&self) -> Option<B256> {
        self.body
            .get("execution_payload_header")?
            .get("block_hash")?
            .as_str()?
            .parse()
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1() -> ExecutionPayloadV1 {
        ExecutionPayloadV1 {
            parent_hash: B256::repeat_byte(1),
            fee_recipient: Address::repeat_byte(2),
            state_root: B256::repeat_byte(3),
            receipts_root: B256::repeat_byte(4),
            logs_bloom: Bloom::ZERO,
            prev_randao: B256::repeat_byte(5),
            block_number: 100,
            gas_limit: 30_000_000,
            gas_used: 21_000,
            timestamp: 1_700_000_000,
            extra_data: Bytes::new(),
            base_fee_per_gas: U256::from(7),
            block_hash: B256::repeat_byte(6),
            transactions: vec![],
        }
    }

    #[test]
    fn test_fork_names() {
        assert_eq!(Fork::Bellatrix.to_string(), "bellatrix");
        assert_eq!(serde_json::to_string(&Fork::Deneb).unwrap(), "\"deneb\"");
        assert!(Fork::Bellatrix < Fork::Capella && Fork::Capella < Fork::Deneb);
    }

    #[test]
    fn test_withdrawals_absent_vs_empty() {
        let bellatrix = ExecutionPayload::Bellatrix(v1());
        let capella = ExecutionPayload::Capella(ExecutionPayloadV2 {
            payload_inner: v1(),
            withdrawals: vec![],
        });
        assert!(bellatrix.withdrawals().is_none());
        assert_eq!(capella.withdrawals(), Some(&[][..]));
    }

    #[test]
    fn test_beacon_payload_uses_decimal_strings() {
        let payload = ExecutionPayload::Bellatrix(v1());
        let json = serde_json::to_value(BeaconExecutionPayload::from(&payload)).unwrap();
        assert_eq!(json["block_number"], "100");
        assert_eq!(json["base_fee_per_gas"], "7");
        assert!(json.get("withdrawals").is_none());
        assert!(json.get("blob_gas_used").is_none());
    }

    #[test]
    fn test_blinded_block_decoding() {
        let json = serde_json::json!({
            "message": {
                "slot": "12",
                "proposer_index": "3",
                "parent_root": B256::ZERO,
                "state_root": B256::ZERO,
                "body": { "execution_payload_header": { "block_hash": B256::repeat_byte(9) } }
            },
            "signature": BlsSignatureBytes::ZERO,
        });
        let block: SignedBlindedBeaconBlock = serde_json::from_value(json).unwrap();
        assert_eq!(block.message.slot, 12);
        assert_eq!(block.message.payload_block_hash(), Some(B256::repeat_byte(9)));
    }
}
