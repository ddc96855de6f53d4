//! Fork bid builder.
//!
//! One algorithm for every fork: value the payload, wrap its header into the
//! fork's bid container, sign the container's signing root with a fresh key
//! and wrap the result in a versioned envelope. Forks differ only in the
//! value policy and in whether blob commitments ride along.

pub mod ssz;

use alloy_primitives::{FixedBytes, U256};
use shared_crypto::{
    compute_domain, compute_signing_root, BlsKeyPair, Domain, Root, DOMAIN_APPLICATION_BUILDER,
};
use tracing::debug;

use crate::domain::{
    BidConfig, BidError, BuilderBid, ChainConfig, Fork, PayloadEnvelope, SignedBidEnvelope,
    SignedBuilderBid, VersionedResponse,
};

/// Gwei per ether. Its square, one ether in wei, is the pre-withdrawal placeholder.
const GWEI_PER_ETH: u64 = 1_000_000_000;

/// Signs bids for payloads fetched from the engine.
#[derive(Debug, Clone)]
pub struct BidBuilder {
    domain: Domain,
    inflate_value: bool,
}

impl BidBuilder {
    pub fn new(chain: &ChainConfig, bid: &BidConfig) -> Result<Self, BidError> {
        // No fork-version or genesis-root override: genesis version, zero root.
        let domain = compute_domain(
            DOMAIN_APPLICATION_BUILDER,
            chain.genesis_fork_version.0,
            Root::ZERO,
        )?;
        Ok(Self {
            domain,
            inflate_value: bid.inflate_value,
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Value offered for a payload the engine valued at `reported`.
    pub fn bid_value(&self, fork: Fork, reported: U256) -> U256 {
        match fork {
            // Engines report no value before withdrawals; offer a fixed placeholder.
            Fork::Bellatrix => U256::from(GWEI_PER_ETH) * U256::from(GWEI_PER_ETH),
            Fork::Capella | Fork::Deneb if self.inflate_value => {
                reported.saturating_mul(U256::from(2))
            }
            Fork::Capella | Fork::Deneb => reported,
        }
    }

    /// Build and sign a bid for `envelope`.
    pub fn build_bid(&self, envelope: &PayloadEnvelope) -> Result<SignedBidEnvelope, BidError> {
        let fork = envelope.fork();
        let header = ssz::payload_header(&envelope.payload)?;
        let blob_kzg_commitments = fork.has_blobs().then(|| {
            envelope
                .blobs_bundle
                .as_ref()
                .map(|bundle| bundle.commitments.clone())
                .unwrap_or_default()
        });

        let key = BlsKeyPair::generate()?;
        let message = BuilderBid {
            header,
            blob_kzg_commitments,
            value: self.bid_value(fork, envelope.block_value),
            pubkey: FixedBytes(key.public_key().to_bytes()),
        };

        let signing_root = compute_signing_root(ssz::bid_root(&message)?, self.domain)?;
        let signature = FixedBytes(key.sign(signing_root.as_slice()).to_bytes());
        debug!(%fork, value = %message.value, block_hash = %message.header.block_hash, "signed bid");

        Ok(VersionedResponse {
            version: fork,
            data: SignedBuilderBid { message, signature },
        })
    }
}
