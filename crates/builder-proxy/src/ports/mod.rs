//! Outbound ports: what the relay needs from the outside world.

pub mod outbound;

pub use outbound::{BlockPrimitives, PayloadSource};
