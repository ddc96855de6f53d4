//! SSZ hash-tree-roots of payload headers and builder bids.
//!
//! Containers are merkleized field by field with [`MerkleHasher`]: basic
//! values become little-endian, right-padded 32-byte leaves; composite
//! values contribute their own root. Lists are merkleized to their maximum
//! capacity and then mixed with their length.

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, Bytes, B256, U256};
use tree_hash::{mix_in_length, MerkleHasher, BYTES_PER_CHUNK};

use crate::domain::{
    BidError, BuilderBid, ExecutionPayload, ExecutionPayloadHeader, Fork, KzgCommitment,
};

pub const MAX_BYTES_PER_TRANSACTION: usize = 1 << 30;
pub const MAX_TRANSACTIONS_PER_PAYLOAD: usize = 1 << 20;
pub const MAX_WITHDRAWALS_PER_PAYLOAD: usize = 16;
pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 4096;
pub const MAX_EXTRA_DATA_BYTES: usize = 32;

const BYTES_PER_LOGS_BLOOM: usize = 256;

fn u64_leaf(value: u64) -> [u8; BYTES_PER_CHUNK] {
    let mut leaf = [0u8; BYTES_PER_CHUNK];
    leaf[..8].copy_from_slice(&value.to_le_bytes());
    leaf
}

fn u256_leaf(value: U256) -> [u8; BYTES_PER_CHUNK] {
    value.to_le_bytes::<32>()
}

fn address_leaf(address: Address) -> [u8; BYTES_PER_CHUNK] {
    let mut leaf = [0u8; BYTES_PER_CHUNK];
    leaf[..20].copy_from_slice(address.as_slice());
    leaf
}

fn check_len(list: &'static str, len: usize, max: usize) -> Result<(), BidError> {
    if len > max {
        return Err(BidError::ListTooLong { list, len, max });
    }
    Ok(())
}

/// Root of a fixed-size byte vector (packed into chunks).
fn byte_vector_root(bytes: &[u8]) -> Result<B256, BidError> {
    let leaves = bytes.len().div_ceil(BYTES_PER_CHUNK);
    let mut hasher = MerkleHasher::with_leaves(leaves);
    hasher.write(bytes)?;
    Ok(hasher.finish()?)
}

/// Root of a `ByteList[max_len]`.
fn byte_list_root(list: &'static str, bytes: &[u8], max_len: usize) -> Result<B256, BidError> {
    check_len(list, bytes.len(), max_len)?;
    let mut hasher = MerkleHasher::with_leaves(max_len.div_ceil(BYTES_PER_CHUNK));
    hasher.write(bytes)?;
    Ok(mix_in_length(&hasher.finish()?, bytes.len()))
}

/// Root of a `List[T, max_len]` whose element roots are already computed.
fn composite_list_root(
    list: &'static str,
    roots: impl ExactSizeIterator<Item = Result<B256, BidError>>,
    max_len: usize,
) -> Result<B256, BidError> {
    let len = roots.len();
    check_len(list, len, max_len)?;
    let mut hasher = MerkleHasher::with_leaves(max_len);
    for root in roots {
        hasher.write(root?.as_slice())?;
    }
    Ok(mix_in_length(&hasher.finish()?, len))
}

/// `List[Transaction, MAX_TRANSACTIONS_PER_PAYLOAD]`
pub fn transactions_root(transactions: &[Bytes]) -> Result<B256, BidError> {
    composite_list_root(
        "transactions",
        transactions
            .iter()
            .map(|tx| byte_list_root("transaction", tx, MAX_BYTES_PER_TRANSACTION)),
        MAX_TRANSACTIONS_PER_PAYLOAD,
    )
}

fn withdrawal_root(withdrawal: &Withdrawal) -> Result<B256, BidError> {
    let mut hasher = MerkleHasher::with_leaves(4);
    hasher.write(&u64_leaf(withdrawal.index))?;
    hasher.write(&u64_leaf(withdrawal.validator_index))?;
    hasher.write(&address_leaf(withdrawal.address))?;
    hasher.write(&u64_leaf(withdrawal.amount))?;
    Ok(hasher.finish()?)
}

/// `List[Withdrawal, MAX_WITHDRAWALS_PER_PAYLOAD]`
pub fn withdrawals_root(withdrawals: &[Withdrawal]) -> Result<B256, BidError> {
    composite_list_root(
        "withdrawals",
        withdrawals.iter().map(withdrawal_root),
        MAX_WITHDRAWALS_PER_PAYLOAD,
    )
}

/// `List[KZGCommitment, MAX_BLOB_COMMITMENTS_PER_BLOCK]`
pub fn blob_commitments_root(commitments: &[KzgCommitment]) -> Result<B256, BidError> {
    composite_list_root(
        "blob_kzg_commitments",
        commitments.iter().map(|c| byte_vector_root(c.as_slice())),
        MAX_BLOB_COMMITMENTS_PER_BLOCK,
    )
}

/// Header of `payload` with SSZ list roots in place of the lists.
pub fn payload_header(payload: &ExecutionPayload) -> Result<ExecutionPayloadHeader, BidError> {
    let p = payload.as_v1();
    let blob_gas = payload.blob_gas();
    Ok(ExecutionPayloadHeader {
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
        transactions_root: transactions_root(&p.transactions)?,
        withdrawals_root: payload.withdrawals().map(withdrawals_root).transpose()?,
        blob_gas_used: blob_gas.map(|(used, _)| used),
        excess_blob_gas: blob_gas.map(|(_, excess)| excess),
    })
}

/// Which header container a header belongs to, from the optional fields it carries.
fn header_fork(header: &ExecutionPayloadHeader) -> Fork {
    match (header.withdrawals_root, header.blob_gas_used) {
        (None, _) => Fork::Bellatrix,
        (Some(_), None) => Fork::Capella,
        (Some(_), Some(_)) => Fork::Deneb,
    }
}

/// `hash_tree_root(ExecutionPayloadHeader)` for the header's fork.
pub fn header_root(header: &ExecutionPayloadHeader) -> Result<B256, BidError> {
    let fields = match header_fork(header) {
        Fork::Bellatrix => 14,
        Fork::Capella => 15,
        Fork::Deneb => 17,
    };
    let mut hasher = MerkleHasher::with_leaves(fields);

    hasher.write(header.parent_hash.as_slice())?;
    hasher.write(&address_leaf(header.fee_recipient))?;
    hasher.write(header.state_root.as_slice())?;
    hasher.write(header.receipts_root.as_slice())?;
    debug_assert_eq!(header.logs_bloom.len(), BYTES_PER_LOGS_BLOOM);
    hasher.write(byte_vector_root(header.logs_bloom.as_slice())?.as_slice())?;
    hasher.write(header.prev_randao.as_slice())?;
    hasher.write(&u64_leaf(header.block_number))?;
    hasher.write(&u64_leaf(header.gas_limit))?;
    hasher.write(&u64_leaf(header.gas_used))?;
    hasher.write(&u64_leaf(header.timestamp))?;
    hasher.write(
        byte_list_root("extra_data", &header.extra_data, MAX_EXTRA_DATA_BYTES)?.as_slice(),
    )?;
    hasher.write(&u256_leaf(header.base_fee_per_gas))?;
    hasher.write(header.block_hash.as_slice())?;
    hasher.write(header.transactions_root.as_slice())?;
    if let Some(root) = header.withdrawals_root {
        hasher.write(root.as_slice())?;
    }
    if let (Some(used), Some(excess)) = (header.blob_gas_used, header.excess_blob_gas) {
        hasher.write(&u64_leaf(used))?;
        hasher.write(&u64_leaf(excess))?;
    }

    Ok(hasher.finish()?)
}

/// `hash_tree_root(BuilderBid)`; the Deneb container adds the commitments list.
pub fn bid_root(bid: &BuilderBid) -> Result<B256, BidError> {
    let header = header_root(&bid.header)?;
    let pubkey = byte_vector_root(bid.pubkey.as_slice())?;

    let mut hasher = match &bid.blob_kzg_commitments {
        Some(commitments) => {
            let mut hasher = MerkleHasher::with_leaves(4);
            hasher.write(header.as_slice())?;
            hasher.write(blob_commitments_root(commitments)?.as_slice())?;
            hasher
        }
        None => {
            let mut hasher = MerkleHasher::with_leaves(3);
            hasher.write(header.as_slice())?;
            hasher
        }
    };
    hasher.write(&u256_leaf(bid.value))?;
    hasher.write(pubkey.as_slice())?;
    Ok(hasher.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::sample_payload;
    use alloy_primitives::{b256, Bloom, FixedBytes};

    /// Header with a distinct byte in every field so a misplaced leaf changes the root.
    fn patterned_header(fork: Fork) -> ExecutionPayloadHeader {
        ExecutionPayloadHeader {
            parent_hash: B256::repeat_byte(0x01),
            fee_recipient: Address::repeat_byte(0x02),
            state_root: B256::repeat_byte(0x03),
            receipts_root: B256::repeat_byte(0x04),
            logs_bloom: Bloom::repeat_byte(0x05),
            prev_randao: B256::repeat_byte(0x06),
            block_number: 7,
            gas_limit: 8,
            gas_used: 9,
            timestamp: 10,
            extra_data: Bytes::from_static(b"builder-proxy"),
            base_fee_per_gas: U256::from(11),
            block_hash: B256::repeat_byte(0x0c),
            transactions_root: B256::repeat_byte(0x0d),
            withdrawals_root: (fork != Fork::Bellatrix).then(|| B256::repeat_byte(0x0e)),
            blob_gas_used: fork.has_blobs().then_some(15),
            excess_blob_gas: fork.has_blobs().then_some(16),
        }
    }

    fn patterned_bid(fork: Fork) -> BuilderBid {
        BuilderBid {
            header: patterned_header(fork),
            blob_kzg_commitments: fork.has_blobs().then(|| {
                vec![KzgCommitment::repeat_byte(0x12), KzgCommitment::repeat_byte(0x13)]
            }),
            value: U256::from(1_000_000_000_000_000_000u128),
            pubkey: FixedBytes::repeat_byte(0x11),
        }
    }

    #[test]
    fn test_empty_transactions_root() {
        assert_eq!(
            transactions_root(&[]).unwrap(),
            b256!("7ffe241ea60187fdb0187bfa22de35d1f9bed7ab061d9401fd47e34a54fbede1")
        );
    }

    #[test]
    fn test_empty_withdrawals_root() {
        assert_eq!(
            withdrawals_root(&[]).unwrap(),
            b256!("792930bbd5baac43bcc798ee49aa8185ef76bb3b44ba62b91d86ae569e4bb535")
        );
    }

    #[test]
    fn test_transactions_root_vector() {
        let txs = [Bytes::from_static(&[1, 2, 3]), Bytes::from_static(&[4, 5])];
        assert_eq!(
            transactions_root(&txs).unwrap(),
            b256!("d8a9a37b96d5e14a9d3168431b9e6af33d38615cd486cf4be4ac2f91e6018c63")
        );
    }

    #[test]
    fn test_withdrawals_root_vector() {
        let withdrawal = Withdrawal {
            index: 1,
            validator_index: 2,
            address: Address::repeat_byte(0x22),
            amount: 3,
        };
        assert_eq!(
            withdrawals_root(&[withdrawal]).unwrap(),
            b256!("465a7ca1a2a3254246c34ce6492db14856c78cf8fcb30b1586ad12bcee517769")
        );
    }

    #[test]
    fn test_header_root_vectors() {
        assert_eq!(
            header_root(&patterned_header(Fork::Bellatrix)).unwrap(),
            b256!("ffde79907acb478bb92750edf7bb5b42b92183eaf6b390921542af511c8b5096")
        );
        assert_eq!(
            header_root(&patterned_header(Fork::Capella)).unwrap(),
            b256!("747fa5babd06dee684ed7857891c64806f75541125a430973b4745958abde94e")
        );
        assert_eq!(
            header_root(&patterned_header(Fork::Deneb)).unwrap(),
            b256!("b22851ec2a248351b97f42a403f7f8700099b9beafad2b9d8d04e38f27def896")
        );
    }

    #[test]
    fn test_bid_root_vectors() {
        assert_eq!(
            bid_root(&patterned_bid(Fork::Capella)).unwrap(),
            b256!("fbc4a8e83b0288dc1af300158b0c18682335bf64683c264f297c28b473035693")
        );
        assert_eq!(
            bid_root(&patterned_bid(Fork::Deneb)).unwrap(),
            b256!("530d732249cfb342892ddf5d691db9ca9f4d240e3ef161ed8938878d63083099")
        );
    }

    #[test]
    fn test_transactions_root_changes_with_content() {
        let a = transactions_root(&[Bytes::from_static(&[1, 2, 3])]).unwrap();
        let b = transactions_root(&[Bytes::from_static(&[1, 2, 4])]).unwrap();
        let two = transactions_root(&[const { Bytes::from_static(&[1, 2, 3]) }; 2]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, two);
    }

    #[test]
    fn test_withdrawals_limit() {
        let withdrawal = Withdrawal {
            index: 0,
            validator_index: 0,
            address: Address::ZERO,
            amount: 0,
        };
        let too_many = vec![withdrawal; MAX_WITHDRAWALS_PER_PAYLOAD + 1];
        assert!(matches!(
            withdrawals_root(&too_many),
            Err(BidError::ListTooLong { max: 16, .. })
        ));
    }

    #[test]
    fn test_extra_data_limit() {
        let mut header = payload_header(&sample_payload(Fork::Bellatrix, vec![])).unwrap();
        header.extra_data = Bytes::from(vec![0u8; 33]);
        assert!(matches!(
            header_root(&header),
            Err(BidError::ListTooLong { list: "extra_data", .. })
        ));
    }

    #[test]
    fn test_header_shape_follows_fork() {
        let bellatrix = payload_header(&sample_payload(Fork::Bellatrix, vec![])).unwrap();
        let capella = payload_header(&sample_payload(Fork::Capella, vec![])).unwrap();
        let deneb = payload_header(&sample_payload(Fork::Deneb, vec![])).unwrap();

        assert_eq!(header_fork(&bellatrix), Fork::Bellatrix);
        assert_eq!(header_fork(&capella), Fork::Capella);
        assert_eq!(header_fork(&deneb), Fork::Deneb);

        let roots = [
            header_root(&bellatrix).unwrap(),
            header_root(&capella).unwrap(),
            header_root(&deneb).unwrap(),
        ];
        assert_ne!(roots[0], roots[1]);
        assert_ne!(roots[1], roots[2]);
    }

    #[test]
    fn test_bid_root_commits_to_value() {
        let header = payload_header(&sample_payload(Fork::Capella, vec![])).unwrap();
        let bid = BuilderBid {
            header,
            blob_kzg_commitments: None,
            value: U256::from(1),
            pubkey: Default::default(),
        };
        let higher = BuilderBid {
            value: U256::from(2),
            ..bid.clone()
        };
        assert_ne!(bid_root(&bid).unwrap(), bid_root(&higher).unwrap());
    }
}
