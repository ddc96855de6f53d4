//! Adapters implementing the outbound ports.

pub mod eth;

pub use eth::EthPrimitives;
