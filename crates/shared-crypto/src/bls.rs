//! BLS12-381 Signature Implementation
//!
//! Provides the BLS primitives a builder needs to answer a header request:
//! - Ephemeral key generation
//! - Signing a 32-byte signing root
//! - Verification (used by callers that check a returned bid)

use blst::min_pk::{PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use zeroize::Zeroize;

use crate::CryptoError;

/// Domain separation tag for BLS signatures (Ethereum consensus compatible)
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key length
pub const PUBLIC_KEY_LEN: usize = 48;

/// Compressed signature length
pub const SIGNATURE_LEN: usize = 96;

/// BLS public key (48 bytes compressed)
#[derive(Clone, Debug)]
pub struct BlsPublicKey(PublicKey);

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsPublicKey {}

/// BLS signature (96 bytes)
#[derive(Clone, Debug)]
pub struct BlsSignature(Signature);

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

/// BLS key pair for signing operations.
///
/// The builder never persists keys: every bid is signed by a freshly
/// generated pair, so relays cannot link two bids to one identity.
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKey,
}

impl BlsKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Result<Self, CryptoError> {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        let secret = SecretKey::key_gen(&ikm, &[]);
        ikm.zeroize();

        let secret =
            secret.map_err(|e| CryptoError::KeyGenerationFailed(format!("{e:?}")))?;
        let public = BlsPublicKey(secret.sk_to_pk());
        Ok(Self { secret, public })
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.secret.sign(message, DST, &[]))
    }

    /// Get the public key
    pub fn public_key(&self) -> BlsPublicKey {
        self.public.clone()
    }
}

impl BlsPublicKey {
    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &BlsSignature) -> bool {
        signature.0.verify(true, message, DST, &[], &self.0, true) == BLST_ERROR::BLST_SUCCESS
    }

    /// Create from 48-byte compressed representation
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, CryptoError> {
        PublicKey::from_bytes(bytes)
            .map(BlsPublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Serialize to 48-byte compressed form
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0.to_bytes()
    }
}

impl BlsSignature {
    /// Create from 96-byte representation
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LEN]) -> Result<Self, CryptoError> {
        Signature::from_bytes(bytes)
            .map(BlsSignature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Serialize to 96-byte form
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }
}
