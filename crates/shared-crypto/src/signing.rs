//! Domain and signing-root computation.
//!
//! A BLS signature on the beacon chain never covers an object directly. It
//! covers `hash_tree_root(SigningData { object_root, domain })`, where the
//! domain mixes a 4-byte purpose tag with the root of the fork data.

use tree_hash::{Hash256, MerkleHasher, BYTES_PER_CHUNK};

use crate::CryptoError;

/// 4-byte fork version
pub type Version = [u8; 4];

/// 4-byte domain purpose tag
pub type DomainType = [u8; 4];

/// 32-byte hash-tree-root
pub type Root = Hash256;

/// 32-byte signing domain
pub type Domain = Hash256;

/// Domain tag used by builders signing bids and registrations.
pub const DOMAIN_APPLICATION_BUILDER: DomainType = [0x00, 0x00, 0x00, 0x01];

/// `hash_tree_root(ForkData { current_version, genesis_validators_root })`
pub fn compute_fork_data_root(
    current_version: Version,
    genesis_validators_root: Root,
) -> Result<Root, CryptoError> {
    let mut version_leaf = [0u8; BYTES_PER_CHUNK];
    version_leaf[..4].copy_from_slice(&current_version);

    let mut hasher = MerkleHasher::with_leaves(2);
    hasher.write(&version_leaf).map_err(merkle_err)?;
    hasher
        .write(genesis_validators_root.as_slice())
        .map_err(merkle_err)?;
    hasher.finish().map_err(merkle_err)
}

/// Domain = `domain_type ++ fork_data_root[..28]`
pub fn compute_domain(
    domain_type: DomainType,
    fork_version: Version,
    genesis_validators_root: Root,
) -> Result<Domain, CryptoError> {
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root)?;

    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(&domain_type);
    domain[4..].copy_from_slice(&fork_data_root.as_slice()[..28]);
    Ok(Hash256::from(domain))
}

/// `hash_tree_root(SigningData { object_root, domain })`
pub fn compute_signing_root(object_root: Root, domain: Domain) -> Result<Root, CryptoError> {
    let mut hasher = MerkleHasher::with_leaves(2);
    hasher.write(object_root.as_slice()).map_err(merkle_err)?;
    hasher.write(domain.as_slice()).map_err(merkle_err)?;
    hasher.finish().map_err(merkle_err)
}

fn merkle_err(e: tree_hash::Error) -> CryptoError {
    CryptoError::Merkleization(format!("{e:?}"))
}
