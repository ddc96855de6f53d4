//! Error types for the proxy, the relay surface and the engine client.
//!
//! Relay errors render as the builder-API error object
//! `{"code": <http status>, "message": <text>}`.

use std::net::SocketAddr;

use alloy_primitives::U256;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared_crypto::CryptoError;
use thiserror::Error;
use tracing::warn;

use super::config::ConfigError;
use super::types::Fork;

/// Errors talking to the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("engine returned HTTP {0}")]
    Status(u16),
    #[error("engine error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("engine response carried neither result nor error")]
    MissingResult,
    #[error("malformed engine response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("jwt error: {0}")]
    Jwt(String),
}

/// Errors converting between engine payloads and canonical blocks.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid transaction {index}: {reason}")]
    InvalidTransaction { index: usize, reason: String },
    #[error("base fee {0} does not fit in 64 bits")]
    BaseFeeOverflow(U256),
    #[error("{fork} block is missing {field}")]
    MissingField { fork: Fork, field: &'static str },
}

/// Errors building or signing a bid.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("{list} has {len} entries, at most {max} allowed")]
    ListTooLong {
        list: &'static str,
        len: usize,
        max: usize,
    },
    #[error("merkleization failed: {0}")]
    Merkleization(String),
    #[error("signing failed: {0}")]
    Signing(#[from] CryptoError),
}

impl From<tree_hash::Error> for BidError {
    fn from(e: tree_hash::Error) -> Self {
        BidError::Merkleization(format!("{e:?}"))
    }
}

/// Per-request relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("no payload id is cached")]
    NoPayloadId,
    #[error("payload not found")]
    NoCachedPayload,
    #[error("execution engine call failed: {0}")]
    Upstream(#[from] EngineError),
    #[error("payload conversion failed: {0}")]
    Codec(#[from] CodecError),
    #[error("could not build bid: {0}")]
    Bid(#[from] BidError),
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn bad_request(details: impl Into<String>) -> Self {
        RelayError::BadRequest(details.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Builder-API error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), error = %self, "relay request failed");
        let body = ErrorMessage {
            code: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to set up bid signing: {0}")]
    Signing(#[from] BidError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::bad_request("bad slot").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::NoPayloadId.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::NoCachedPayload.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::from(EngineError::MissingResult).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(RelayError::NoPayloadId.to_string(), "no payload id is cached");
        assert_eq!(RelayError::NoCachedPayload.to_string(), "payload not found");
        let err = CodecError::InvalidTransaction {
            index: 2,
            reason: "unexpected type".into(),
        };
        assert_eq!(err.to_string(), "invalid transaction 2: unexpected type");
        let err = CodecError::MissingField {
            fork: Fork::Capella,
            field: "withdrawals",
        };
        assert_eq!(err.to_string(), "capella block is missing withdrawals");
    }

    #[test]
    fn test_error_body_serialization() {
        let body = ErrorMessage {
            code: 400,
            message: "invalid slot".into(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"code":400,"message":"invalid slot"}"#);
    }

    #[test]
    fn test_into_response_status() {
        let response = RelayError::bad_request("invalid pubkey").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
