//! Proxy configuration with validation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::FixedBytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use super::types::Fork;

/// Maximum length of the extra-data header field
pub const MAX_EXTRA_DATA_BYTES: usize = 32;

/// Main proxy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening socket for the consensus client
    pub server: ServerConfig,
    /// Upstream execution engine
    pub engine: EngineConfig,
    /// Fork schedule and signing parameters
    pub chain: ChainConfig,
    /// Bid construction policy
    pub bid: BidConfig,
}

impl ProxyConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.endpoint()?;

        if self.server.header_read_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "header_read_timeout cannot be 0".into(),
            ));
        }

        if self.chain.slots_per_epoch == 0 {
            return Err(ConfigError::InvalidSlotsPerEpoch);
        }

        if self.chain.deneb_fork_epoch < self.chain.capella_fork_epoch {
            return Err(ConfigError::InvalidForkSchedule {
                capella: self.chain.capella_fork_epoch,
                deneb: self.chain.deneb_fork_epoch,
            });
        }

        if self.bid.extra_data.len() > MAX_EXTRA_DATA_BYTES {
            return Err(ConfigError::ExtraDataTooLong(self.bid.extra_data.len()));
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8551)
    pub port: u16,
    /// Deadline for a client to finish sending request headers
    #[serde(with = "humantime_serde")]
    pub header_read_timeout: Duration,
    /// How long in-flight connections may drain after shutdown is requested
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Get server bind address
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8551,
            header_read_timeout: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Upstream execution engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine API endpoint every non-relay request is forwarded to
    pub url: Option<Url>,
    /// Shared secret for Engine API bearer authentication
    pub jwt_secret: Option<JwtSecret>,
}

impl EngineConfig {
    /// The configured endpoint, or an error if none was given.
    pub fn endpoint(&self) -> Result<&Url, ConfigError> {
        self.url.as_ref().ok_or(ConfigError::MissingEngineUrl)
    }
}

/// Fork schedule and signing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Slots per epoch (default: 32)
    pub slots_per_epoch: u64,
    /// First epoch of the withdrawal-enabled fork
    pub capella_fork_epoch: u64,
    /// First epoch of the blob-enabled fork
    pub deneb_fork_epoch: u64,
    /// Fork version mixed into the builder signing domain
    pub genesis_fork_version: FixedBytes<4>,
}

impl ChainConfig {
    /// Fork active at `slot`. Later forks win when several thresholds are met.
    pub fn fork_at_slot(&self, slot: u64) -> Fork {
        let epoch = slot / self.slots_per_epoch.max(1);
        if epoch >= self.deneb_fork_epoch {
            Fork::Deneb
        } else if epoch >= self.capella_fork_epoch {
            Fork::Capella
        } else {
            Fork::Bellatrix
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        // Mainnet
        Self {
            slots_per_epoch: 32,
            capella_fork_epoch: 194_048,
            deneb_fork_epoch: 269_568,
            genesis_fork_version: FixedBytes::ZERO,
        }
    }
}

/// Bid construction policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BidConfig {
    /// Double the engine-reported block value so the bid always beats a
    /// locally built payload
    pub inflate_value: bool,
    /// Tag written into the extra-data field of every offered payload
    pub extra_data: String,
}

impl Default for BidConfig {
    fn default() -> Self {
        Self {
            inflate_value: true,
            extra_data: "builder-proxy".into(),
        }
    }
}

/// 32-byte Engine API JWT secret.
///
/// Parsed from hex (with or without `0x`), the format execution engines
/// write to their `jwt.hex` file.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct JwtSecret([u8; 32]);

impl JwtSecret {
    /// Wrap raw secret bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw secret bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JwtSecret(..)")
    }
}

impl FromStr for JwtSecret {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_str)
            .map_err(|e| ConfigError::InvalidJwtSecret(e.to_string()))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ConfigError::InvalidJwtSecret(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(secret))
    }
}

impl Serialize for JwtSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for JwtSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("execution engine url is required")]
    MissingEngineUrl,
    #[error("invalid jwt secret: {0}")]
    InvalidJwtSecret(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("slots_per_epoch cannot be 0")]
    InvalidSlotsPerEpoch,
    #[error("deneb fork epoch {deneb} precedes capella fork epoch {capella}")]
    InvalidForkSchedule { capella: u64, deneb: u64 },
    #[error("extra data is {0} bytes, at most {MAX_EXTRA_DATA_BYTES} allowed")]
    ExtraDataTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.engine.url = Some("http://127.0.0.1:8552".parse().unwrap());
        config
    }

    #[test]
    fn test_default_config_needs_engine_url() {
        assert!(matches!(
            ProxyConfig::default().validate(),
            Err(ConfigError::MissingEngineUrl)
        ));
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_default_listen_address() {
        let config = ProxyConfig::default();
        assert_eq!(config.server.address().to_string(), "127.0.0.1:8551");
        assert_eq!(config.server.header_read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_fork_schedule_rejected_when_inverted() {
        let mut config = valid();
        config.chain.capella_fork_epoch = 10;
        config.chain.deneb_fork_epoch = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidForkSchedule { capella: 10, deneb: 5 })
        ));
    }

    #[test]
    fn test_extra_data_limit() {
        let mut config = valid();
        config.bid.extra_data = "x".repeat(33);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ExtraDataTooLong(33))
        ));
    }

    #[test]
    fn test_fork_at_slot() {
        let chain = ChainConfig {
            slots_per_epoch: 32,
            capella_fork_epoch: 2,
            deneb_fork_epoch: 4,
            genesis_fork_version: FixedBytes::ZERO,
        };
        assert_eq!(chain.fork_at_slot(0), Fork::Bellatrix);
        assert_eq!(chain.fork_at_slot(63), Fork::Bellatrix);
        assert_eq!(chain.fork_at_slot(64), Fork::Capella);
        assert_eq!(chain.fork_at_slot(127), Fork::Capella);
        assert_eq!(chain.fork_at_slot(128), Fork::Deneb);
    }

    #[test]
    fn test_same_epoch_forks_pick_latest() {
        let chain = ChainConfig {
            capella_fork_epoch: 0,
            deneb_fork_epoch: 0,
            ..ChainConfig::default()
        };
        assert_eq!(chain.fork_at_slot(0), Fork::Deneb);
    }

    #[test]
    fn test_jwt_secret_parsing() {
        let hex_secret = format!("0x{}\n", "ab".repeat(32));
        let secret: JwtSecret = hex_secret.parse().unwrap();
        assert_eq!(secret.as_bytes(), &[0xab; 32]);

        assert!("abcd".parse::<JwtSecret>().is_err());
        assert!("zz".repeat(32).parse::<JwtSecret>().is_err());
        assert_eq!(format!("{secret:?}"), "JwtSecret(..)");
    }

    #[test]
    fn test_config_from_json() {
        let json = serde_json::json!({
            "server": { "port": 9000, "header_read_timeout": "2s" },
            "engine": { "url": "http://localhost:8551", "jwt_secret": "11".repeat(32) },
            "bid": { "inflate_value": false }
        });
        let config: ProxyConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.header_read_timeout, Duration::from_secs(2));
        assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(!config.bid.inflate_value);
        assert_eq!(config.bid.extra_data, "builder-proxy");
        assert!(config.engine.jwt_secret.is_some());
        assert!(config.validate().is_ok());
    }
}
