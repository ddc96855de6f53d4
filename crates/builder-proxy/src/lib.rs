//! Builder proxy - an Engine API man-in-the-middle that impersonates a
//! builder relay.
//!
//! The consensus client is pointed at this proxy both as its execution
//! engine and as its external builder. Engine traffic passes through
//! untouched while the proxy notes payload ids and parent beacon roots; the
//! builder API is answered by signing bids for the payload the engine is
//! already building.
//!
//! # Architecture
//!
//! ```text
//!                     consensus client
//!                            │
//! ┌──────────────────────────┼──────────────────────────────────────┐
//! │  BUILDER PROXY           ▼                                      │
//! │                   ┌─────────────┐                               │
//! │                   │ TracingLayer│                               │
//! │                   └──────┬──────┘                               │
//! │            /eth/v1/builder/*    everything else                 │
//! │          ┌───────────┴───────────┐                              │
//! │          ▼                       ▼                              │
//! │  ┌───────────────┐       ┌───────────────┐    ┌──────────────┐  │
//! │  │ Relay handlers│       │   Forwarder   │───→│ Interceptor  │  │
//! │  └───┬───────┬───┘       └───────┬───────┘    └──────┬───────┘  │
//! │      │       │                   │                   │          │
//! │      │  ┌────┴─────────┐         │            ┌──────┴───────┐  │
//! │      │  │ Codec → Bids │         │            │  BuildState  │  │
//! │      │  └──────────────┘         │            └──────────────┘  │
//! │      │ getPayload                │                              │
//! └──────┼───────────────────────────┼──────────────────────────────┘
//!        ▼                           ▼
//!                   execution engine
//! ```
//!
//! # Build round
//!
//! 1. `engine_forkchoiceUpdated` with attributes is forwarded; the interceptor
//!    stores the returned payload id (and, for V3, the parent beacon root).
//! 2. `GET /eth/v1/builder/header/...` fetches that payload with the
//!    `getPayload` version of the slot's fork, rebuilds it with this builder's
//!    extra data, signs a bid with a fresh BLS key and caches the payload.
//! 3. `POST /eth/v1/builder/blinded_blocks` returns the cached payload and
//!    clears it.
//!
//! # Usage
//!
//! ```ignore
//! use builder_proxy::{BuilderProxyService, ProxyConfig};
//!
//! let service = BuilderProxyService::new(config)?;
//! service.start(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod bid;
pub mod codec;
pub mod domain;
pub mod engine;
pub mod middleware;
pub mod ports;
pub mod proxy;
pub mod relay;
pub mod service;

// Re-exports for public API
pub use bid::BidBuilder;
pub use codec::{CanonicalBlock, PayloadCodec};
pub use domain::config::{
    BidConfig, ChainConfig, ConfigError, EngineConfig, JwtSecret, ProxyConfig, ServerConfig,
};
pub use domain::error::{BidError, CodecError, EngineError, ProxyError, RelayError};
pub use domain::registry::{ValidatorRegistration, ValidatorRegistry};
pub use domain::state::{BuildPhase, BuildState, CachedBuild};
pub use domain::types::*;
pub use engine::{EngineCallInterceptor, EngineClient};
pub use middleware::RelayMetrics;
pub use ports::{BlockPrimitives, PayloadSource};
pub use service::BuilderProxyService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
