//! Ethereum execution-layer primitives backed by alloy.

use alloy_consensus::proofs::{calculate_transaction_root, calculate_withdrawals_root};
use alloy_consensus::{Header, TxEnvelope};
use alloy_eips::eip2718::{Decodable2718, Encodable2718};
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Bytes, B256};

use crate::ports::BlockPrimitives;

/// EIP-2718 typed transactions, trie roots, keccak header hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthPrimitives;

impl BlockPrimitives for EthPrimitives {
    type Transaction = TxEnvelope;

    fn decode_transaction(&self, raw: &[u8]) -> Result<TxEnvelope, String> {
        let mut buf = raw;
        let tx = TxEnvelope::decode_2718(&mut buf).map_err(|e| e.to_string())?;
        if !buf.is_empty() {
            return Err(format!("{} trailing bytes", buf.len()));
        }
        Ok(tx)
    }

    fn encode_transaction(&self, tx: &TxEnvelope) -> Bytes {
        tx.encoded_2718().into()
    }

    fn transactions_root(&self, txs: &[TxEnvelope]) -> B256 {
        calculate_transaction_root(txs)
    }

    fn withdrawals_root(&self, withdrawals: &[Withdrawal]) -> B256 {
        calculate_withdrawals_root(withdrawals)
    }

    fn block_hash(&self, header: &Header) -> B256 {
        header.hash_slow()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxLegacy};
    use alloy_primitives::{b256, Address, Signature, TxKind, U256};

    const EMPTY_TRIE_ROOT: B256 =
        b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

    /// A legacy transfer encoded the way engines put it in payloads.
    pub(crate) fn raw_transfer(nonce: u64) -> Bytes {
        let tx = TxLegacy {
            chain_id: Some(1),
            nonce,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(Address::repeat_byte(0x11)),
            value: U256::from(1),
            input: Bytes::new(),
        };
        let signature = Signature::new(U256::from(1), U256::from(2), false);
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        envelope.encoded_2718().into()
    }

    #[test]
    fn test_decode_encode_preserves_bytes() {
        let raw = raw_transfer(3);
        let tx = EthPrimitives.decode_transaction(&raw).unwrap();
        assert_eq!(EthPrimitives.encode_transaction(&tx), raw);
    }

    #[test]
    fn test_decode_rejects_garbage_and_trailing_bytes() {
        assert!(EthPrimitives.decode_transaction(&[0x7f, 0x00]).is_err());

        let mut raw = raw_transfer(0).to_vec();
        raw.push(0);
        let err = EthPrimitives.decode_transaction(&raw).unwrap_err();
        assert!(err.contains("trailing"));
    }

    #[test]
    fn test_empty_list_roots() {
        assert_eq!(EthPrimitives.transactions_root(&[]), EMPTY_TRIE_ROOT);
        assert_eq!(EthPrimitives.withdrawals_root(&[]), EMPTY_TRIE_ROOT);
    }

    #[test]
    fn test_transactions_root_depends_on_order() {
        let a = EthPrimitives.decode_transaction(&raw_transfer(0)).unwrap();
        let b = EthPrimitives.decode_transaction(&raw_transfer(1)).unwrap();
        assert_ne!(
            EthPrimitives.transactions_root(&[a.clone(), b.clone()]),
            EthPrimitives.transactions_root(&[b, a])
        );
    }
}
