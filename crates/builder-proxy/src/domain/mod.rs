//! Domain layer: configuration, errors, wire types and shared state.

pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod types;

pub use config::{
    BidConfig, ChainConfig, ConfigError, EngineConfig, JwtSecret, ProxyConfig, ServerConfig,
};
pub use error::{BidError, CodecError, EngineError, ErrorMessage, ProxyError, RelayError};
pub use registry::{
    RegistrationError, SignedValidatorRegistrationJson, ValidatorRegistration, ValidatorRegistry,
};
pub use state::{BuildPhase, BuildState, CachedBuild};
pub use types::*;
