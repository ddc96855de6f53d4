//! Request middleware for the proxy listener.
//!
//! Layer order: Request → Tracing → Router (relay routes | forwarder)

pub mod metrics;
pub mod tracing;

pub use metrics::{RelayMetrics, RelayOperation, RequestTimer};
pub use tracing::TracingLayer;
