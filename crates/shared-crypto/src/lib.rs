//! # Shared Crypto - Builder Signing Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `bls` | BLS12-381 (min-pk, blst) | Ephemeral builder keys, bid signatures |
//! | `signing` | SSZ hash-tree-root | Domain and signing-root computation |
//!
//! ## Security Properties
//!
//! - **BLS**: proof-of-possession ciphersuite, the same DST the beacon chain uses
//! - **Ephemeral keys**: input key material is wiped once the secret key is derived

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bls;
pub mod errors;
pub mod signing;

// Re-exports
pub use bls::{BlsKeyPair, BlsPublicKey, BlsSignature};
pub use errors::CryptoError;
pub use signing::{
    compute_domain, compute_signing_root, Domain, DomainType, Root, Version,
    DOMAIN_APPLICATION_BUILDER,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
