//! Validator registry.
//!
//! Registrations arrive as beacon JSON with string fields. Decoding the
//! array is a client error; converting an entry is a server error.

use std::collections::HashMap;

use alloy_primitives::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::types::{BlsPubkey, BlsSignatureBytes};

/// Registration message exactly as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationMessageJson {
    pub fee_recipient: String,
    pub gas_limit: String,
    pub timestamp: String,
    pub pubkey: String,
}

/// Signed registration exactly as submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedValidatorRegistrationJson {
    pub message: RegistrationMessageJson,
    pub signature: String,
}

/// A converted registration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRegistration {
    pub pubkey: BlsPubkey,
    pub fee_recipient: Address,
    pub gas_limit: u64,
    pub timestamp: u64,
    /// Stored, never verified
    pub signature: BlsSignatureBytes,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl RegistrationError {
    fn field(field: &'static str, e: impl std::fmt::Display) -> Self {
        RegistrationError::InvalidField {
            field,
            reason: e.to_string(),
        }
    }
}

impl TryFrom<&SignedValidatorRegistrationJson> for ValidatorRegistration {
    type Error = RegistrationError;

    fn try_from(raw: &SignedValidatorRegistrationJson) -> Result<Self, Self::Error> {
        let msg = &raw.message;
        Ok(Self {
            pubkey: msg
                .pubkey
                .parse()
                .map_err(|e| RegistrationError::field("pubkey", e))?,
            fee_recipient: msg
                .fee_recipient
                .parse()
                .map_err(|e| RegistrationError::field("fee_recipient", e))?,
            gas_limit: msg
                .gas_limit
                .parse()
                .map_err(|e| RegistrationError::field("gas_limit", e))?,
            timestamp: msg
                .timestamp
                .parse()
                .map_err(|e| RegistrationError::field("timestamp", e))?,
            signature: raw
                .signature
                .parse()
                .map_err(|e| RegistrationError::field("signature", e))?,
        })
    }
}

/// Public key → latest registration. Last write wins, nothing expires.
#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<BlsPubkey, ValidatorRegistration>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the replaced registration, if any.
    pub fn register(&self, registration: ValidatorRegistration) -> Option<ValidatorRegistration> {
        self.validators
            .write()
            .insert(registration.pubkey, registration)
    }

    pub fn lookup(&self, pubkey: &BlsPubkey) -> Option<ValidatorRegistration> {
        self.validators.read().get(pubkey).cloned()
    }

    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }
}
