//! Payload codec: engine payload ⇄ canonical block.
//!
//! Rebuilding the block re-derives every content-addressed field the builder
//! changes or must vouch for: the transaction and withdrawal trie roots, the
//! extra-data tag and the block hash.

use alloy_consensus::{Header, EMPTY_OMMER_ROOT_HASH};
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Bytes, B256, B64, U256};
use alloy_rpc_types_engine::{
    BlobsBundleV1, ExecutionPayloadV1, ExecutionPayloadV2, ExecutionPayloadV3,
};

use crate::adapters::EthPrimitives;
use crate::domain::{CodecError, ExecutionPayload, Fork, PayloadEnvelope};
use crate::ports::BlockPrimitives;

/// A block rebuilt from an engine payload.
#[derive(Debug, Clone)]
pub struct CanonicalBlock<T> {
    pub fork: Fork,
    pub header: Header,
    pub transactions: Vec<T>,
    /// `None` before withdrawals existed; `Some(vec![])` is a real, empty list.
    pub withdrawals: Option<Vec<Withdrawal>>,
    pub hash: B256,
}

/// Converts engine payloads to canonical blocks and back.
#[derive(Debug, Clone)]
pub struct PayloadCodec<P = EthPrimitives> {
    primitives: P,
    extra_data: Bytes,
}

impl PayloadCodec<EthPrimitives> {
    pub fn new(extra_data: impl Into<Bytes>) -> Self {
        Self::with_primitives(EthPrimitives, extra_data)
    }
}

impl<P: BlockPrimitives> PayloadCodec<P> {
    pub fn with_primitives(primitives: P, extra_data: impl Into<Bytes>) -> Self {
        Self {
            primitives,
            extra_data: extra_data.into(),
        }
    }

    /// Rebuild a block from `payload`, tagging it with this builder's extra data.
    ///
    /// `parent_beacon_root` only applies to blob-era payloads and is ignored
    /// for earlier forks.
    pub fn to_canonical_block(
        &self,
        payload: &ExecutionPayload,
        parent_beacon_root: Option<B256>,
    ) -> Result<CanonicalBlock<P::Transaction>, CodecError> {
        let p = payload.as_v1();
        let fork = payload.fork();

        let transactions = p
            .transactions
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                self.primitives
                    .decode_transaction(raw)
                    .map_err(|reason| CodecError::InvalidTransaction { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let withdrawals = payload.withdrawals().map(<[Withdrawal]>::to_vec);
        let base_fee = u64::try_from(p.base_fee_per_gas)
            .map_err(|_| CodecError::BaseFeeOverflow(p.base_fee_per_gas))?;
        let blob_gas = payload.blob_gas();

        let header = Header {
            parent_hash: p.parent_hash,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            beneficiary: p.fee_recipient,
            state_root: p.state_root,
            transactions_root: self.primitives.transactions_root(&transactions),
            receipts_root: p.receipts_root,
            logs_bloom: p.logs_bloom,
            difficulty: U256::ZERO,
            number: p.block_number,
            gas_limit: p.gas_limit,
            gas_used: p.gas_used,
            timestamp: p.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: p.prev_randao,
            nonce: B64::ZERO,
            base_fee_per_gas: Some(base_fee),
            withdrawals_root: withdrawals
                .as_deref()
                .map(|ws| self.primitives.withdrawals_root(ws)),
            blob_gas_used: blob_gas.map(|(used, _)| used),
            excess_blob_gas: blob_gas.map(|(_, excess)| excess),
            parent_beacon_block_root: parent_beacon_root.filter(|_| fork.has_blobs()),
            ..Default::default()
        };
        let hash = self.primitives.block_hash(&header);

        Ok(CanonicalBlock {
            fork,
            header,
            transactions,
            withdrawals,
            hash,
        })
    }

    /// Serialize `block` back into the engine wire shape of its fork.
    pub fn to_wire_envelope(
        &self,
        block: &CanonicalBlock<P::Transaction>,
        value: U256,
        blobs_bundle: Option<BlobsBundleV1>,
    ) -> Result<PayloadEnvelope, CodecError> {
        let h = &block.header;
        let missing = |field| CodecError::MissingField {
            fork: block.fork,
            field,
        };

        let v1 = ExecutionPayloadV1 {
            parent_hash: h.parent_hash,
            fee_recipient: h.beneficiary,
            state_root: h.state_root,
            receipts_root: h.receipts_root,
            logs_bloom: h.logs_bloom,
            prev_randao: h.mix_hash,
            block_number: h.number,
            gas_limit: h.gas_limit,
            gas_used: h.gas_used,
            timestamp: h.timestamp,
            extra_data: h.extra_data.clone(),
            base_fee_per_gas: U256::from(h.base_fee_per_gas.ok_or_else(|| missing("base fee"))?),
            block_hash: block.hash,
            transactions: block
                .transactions
                .iter()
                .map(|tx| self.primitives.encode_transaction(tx))
                .collect(),
        };

        let payload = match block.fork {
            Fork::Bellatrix => ExecutionPayload::Bellatrix(v1),
            Fork::Capella | Fork::Deneb => {
                let v2 = ExecutionPayloadV2 {
                    payload_inner: v1,
                    withdrawals: block
                        .withdrawals
                        .clone()
                        .ok_or_else(|| missing("withdrawals"))?,
                };
                if block.fork == Fork::Capella {
                    ExecutionPayload::Capella(v2)
                } else {
                    ExecutionPayload::Deneb(ExecutionPayloadV3 {
                        payload_inner: v2,
                        blob_gas_used: h.blob_gas_used.ok_or_else(|| missing("blob gas used"))?,
                        excess_blob_gas: h
                            .excess_blob_gas
                            .ok_or_else(|| missing("excess blob gas"))?,
                    })
                }
            }
        };

        Ok(PayloadEnvelope {
            payload,
            block_value: value,
            blobs_bundle: blobs_bundle.filter(|_| block.fork.has_blobs()),
        })
    }

    /// Rebuild `envelope` as this builder's block, keeping its value and blobs.
    pub fn rebuild(
        &self,
        envelope: PayloadEnvelope,
        parent_beacon_root: Option<B256>,
    ) -> Result<PayloadEnvelope, CodecError> {
        let block = self.to_canonical_block(&envelope.payload, parent_beacon_root)?;
        self.to_wire_envelope(&block, envelope.block_value, envelope.blobs_bundle)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::eth::tests::raw_transfer;
    use alloy_primitives::{b256, Address, Bloom};

    const EMPTY_TRIE_ROOT: B256 =
        b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

    pub(crate) fn sample_v1(transactions: Vec<Bytes>) -> ExecutionPayloadV1 {
        ExecutionPayloadV1 {
            parent_hash: B256::repeat_byte(0x01),
            fee_recipient: Address::repeat_byte(0x02),
            state_root: B256::repeat_byte(0x03),
            receipts_root: B256::repeat_byte(0x04),
            logs_bloom: Bloom::repeat_byte(0x05),
            prev_randao: B256::repeat_byte(0x06),
            block_number: 1234,
            gas_limit: 30_000_000,
            gas_used: 42_000,
            timestamp: 1_700_000_000,
            extra_data: Bytes::from_static(b"local"),
            base_fee_per_gas: U256::from(1_000_000_000u64),
            block_hash: B256::repeat_byte(0x07),
            transactions,
        }
    }

    pub(crate) fn sample_payload(fork: Fork, transactions: Vec<Bytes>) -> ExecutionPayload {
        let v1 = sample_v1(transactions);
        let withdrawals = vec![Withdrawal {
            index: 5,
            validator_index: 9,
            address: Address::repeat_byte(0x0a),
            amount: 32_000,
        }];
        match fork {
            Fork::Bellatrix => ExecutionPayload::Bellatrix(v1),
            Fork::Capella => ExecutionPayload::Capella(ExecutionPayloadV2 {
                payload_inner: v1,
                withdrawals,
            }),
            Fork::Deneb => ExecutionPayload::Deneb(ExecutionPayloadV3 {
                payload_inner: ExecutionPayloadV2 {
                    payload_inner: v1,
                    withdrawals,
                },
                blob_gas_used: 131_072,
                excess_blob_gas: 0,
            }),
        }
    }

    fn codec() -> PayloadCodec {
        PayloadCodec::new(Bytes::from_static(b"builder-proxy"))
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let txs = vec![raw_transfer(0), raw_transfer(1)];
        for fork in [Fork::Bellatrix, Fork::Capella, Fork::Deneb] {
            let original = sample_payload(fork, txs.clone());
            let block = codec()
                .to_canonical_block(&original, Some(B256::repeat_byte(0xbb)))
                .unwrap();
            let rebuilt = codec()
                .to_wire_envelope(&block, U256::from(3), None)
                .unwrap()
                .payload;

            assert_eq!(rebuilt.fork(), fork);
            let (a, b) = (original.as_v1(), rebuilt.as_v1());
            assert_eq!(b.extra_data, Bytes::from_static(b"builder-proxy"));
            assert_eq!(b.block_hash, block.hash);
            assert_ne!(b.block_hash, a.block_hash);
            assert_eq!(
                ExecutionPayloadV1 {
                    extra_data: a.extra_data.clone(),
                    block_hash: a.block_hash,
                    ..b.clone()
                },
                *a
            );
            assert_eq!(rebuilt.withdrawals(), original.withdrawals());
            assert_eq!(rebuilt.blob_gas(), original.blob_gas());
        }
    }

    #[test]
    fn test_header_overrides() {
        let payload = sample_payload(Fork::Capella, vec![]);
        let block = codec().to_canonical_block(&payload, None).unwrap();

        assert_eq!(block.header.ommers_hash, EMPTY_OMMER_ROOT_HASH);
        assert_eq!(block.header.difficulty, U256::ZERO);
        assert_eq!(block.header.transactions_root, EMPTY_TRIE_ROOT);
        assert_eq!(block.header.extra_data.as_ref(), b"builder-proxy");
        assert!(block.header.withdrawals_root.is_some());
        assert_ne!(block.header.withdrawals_root, Some(EMPTY_TRIE_ROOT));
        assert_eq!(block.hash, block.header.hash_slow());
    }

    #[test]
    fn test_empty_withdrawals_differ_from_absent() {
        let bellatrix = codec()
            .to_canonical_block(&sample_payload(Fork::Bellatrix, vec![]), None)
            .unwrap();
        assert!(bellatrix.header.withdrawals_root.is_none());

        let empty = ExecutionPayload::Capella(ExecutionPayloadV2 {
            payload_inner: sample_v1(vec![]),
            withdrawals: vec![],
        });
        let capella = codec().to_canonical_block(&empty, None).unwrap();
        assert_eq!(capella.header.withdrawals_root, Some(EMPTY_TRIE_ROOT));
    }

    #[test]
    fn test_parent_beacon_root_only_for_deneb() {
        let root = Some(B256::repeat_byte(0xcc));
        let capella = codec()
            .to_canonical_block(&sample_payload(Fork::Capella, vec![]), root)
            .unwrap();
        let deneb = codec()
            .to_canonical_block(&sample_payload(Fork::Deneb, vec![]), root)
            .unwrap();
        let deneb_without = codec()
            .to_canonical_block(&sample_payload(Fork::Deneb, vec![]), None)
            .unwrap();

        assert!(capella.header.parent_beacon_block_root.is_none());
        assert_eq!(deneb.header.parent_beacon_block_root, root);
        assert_eq!(deneb.header.blob_gas_used, Some(131_072));
        assert_ne!(deneb.hash, deneb_without.hash);
    }

    #[test]
    fn test_invalid_transaction_reports_index() {
        let payload = sample_payload(
            Fork::Bellatrix,
            vec![raw_transfer(0), Bytes::from_static(&[0x7f, 0x01])],
        );
        let err = codec().to_canonical_block(&payload, None).unwrap_err();
        assert!(matches!(err, CodecError::InvalidTransaction { index: 1, .. }));
    }

    #[test]
    fn test_base_fee_overflow() {
        let mut v1 = sample_v1(vec![]);
        v1.base_fee_per_gas = U256::from(u64::MAX) + U256::from(1);
        let err = codec()
            .to_canonical_block(&ExecutionPayload::Bellatrix(v1), None)
            .unwrap_err();
        assert!(matches!(err, CodecError::BaseFeeOverflow(_)));
    }

    #[test]
    fn test_blobs_bundle_kept_only_for_deneb() {
        let bundle = BlobsBundleV1 {
            commitments: vec![],
            proofs: vec![],
            blobs: vec![],
        };
        let capella = codec()
            .rebuild(
                PayloadEnvelope {
                    payload: sample_payload(Fork::Capella, vec![]),
                    block_value: U256::from(1),
                    blobs_bundle: Some(bundle.clone()),
                },
                None,
            )
            .unwrap();
        assert!(capella.blobs_bundle.is_none());
        assert_eq!(capella.block_value, U256::from(1));

        let deneb = codec()
            .rebuild(
                PayloadEnvelope {
                    payload: sample_payload(Fork::Deneb, vec![]),
                    block_value: U256::from(1),
                    blobs_bundle: Some(bundle),
                },
                None,
            )
            .unwrap();
        assert!(deneb.blobs_bundle.is_some());
    }

    #[test]
    fn test_missing_withdrawals_rejected() {
        let mut block = codec()
            .to_canonical_block(&sample_payload(Fork::Capella, vec![]), None)
            .unwrap();
        block.withdrawals = None;
        let err = codec()
            .to_wire_envelope(&block, U256::ZERO, None)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::MissingField {
                fork: Fork::Capella,
                field: "withdrawals"
            }
        ));
    }
}
