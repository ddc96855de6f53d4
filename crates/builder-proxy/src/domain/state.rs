//! Shared build state.
//!
//! The engine flow (forkchoice updates seen by the interceptor) and the relay
//! flow (header and blinded-block requests) never share a connection, but
//! they hand one in-flight build to each other. All of that hand-off lives
//! behind a single lock and is only reachable through the operations below.
//!
//! ```text
//! NoPendingBuild ──fcU with payload id──→ BuildRequested
//!       ↑                                      │
//!       │                               getHeader (getPayload ok)
//!   blinded block                              ↓
//!       └────────────── Unblinded ←──── HeaderIssued
//! ```

use alloy_primitives::B256;
use alloy_rpc_types_engine::PayloadId;
use parking_lot::Mutex;

use super::types::{Fork, PayloadEnvelope};

/// Where the current build round stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    NoPendingBuild,
    BuildRequested,
    HeaderIssued,
}

/// A payload that was offered in a bid and not yet revealed.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBuild {
    pub slot: u64,
    pub envelope: PayloadEnvelope,
}

impl CachedBuild {
    pub fn fork(&self) -> Fork {
        self.envelope.fork()
    }
}

#[derive(Debug, Default)]
struct Inner {
    payload_id: Option<PayloadId>,
    parent_beacon_root: Option<B256>,
    cached: Option<CachedBuild>,
}

/// Single in-flight build shared by the engine and relay flows.
#[derive(Debug, Default)]
pub struct BuildState {
    inner: Mutex<Inner>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new pending id, replacing any previous one.
    pub fn set_payload_id(&self, id: PayloadId) -> Option<PayloadId> {
        self.inner.lock().payload_id.replace(id)
    }

    pub fn pending_payload_id(&self) -> Option<PayloadId> {
        self.inner.lock().payload_id
    }

    /// Clear the pending id if it still equals `id`.
    ///
    /// Returns `false` when a newer forkchoice update already replaced it.
    pub fn consume_payload_id(&self, id: PayloadId) -> bool {
        let mut inner = self.inner.lock();
        if inner.payload_id == Some(id) {
            inner.payload_id = None;
            true
        } else {
            false
        }
    }

    pub fn set_parent_beacon_root(&self, root: B256) {
        self.inner.lock().parent_beacon_root = Some(root);
    }

    pub fn parent_beacon_root(&self) -> Option<B256> {
        self.inner.lock().parent_beacon_root
    }

    /// Record the payload offered in a bid, replacing any previous one.
    pub fn cache_payload(&self, build: CachedBuild) {
        self.inner.lock().cached = Some(build);
    }

    pub fn has_cached_payload(&self) -> bool {
        self.inner.lock().cached.is_some()
    }

    pub fn cached_payload(&self) -> Option<CachedBuild> {
        self.inner.lock().cached.clone()
    }

    /// Remove and return the offered payload.
    pub fn take_cached_payload(&self) -> Option<CachedBuild> {
        self.inner.lock().cached.take()
    }

    pub fn phase(&self) -> BuildPhase {
        let inner = self.inner.lock();
        if inner.cached.is_some() {
            BuildPhase::HeaderIssued
        } else if inner.payload_id.is_some() {
            BuildPhase::BuildRequested
        } else {
            BuildPhase::NoPendingBuild
        }
    }
}
