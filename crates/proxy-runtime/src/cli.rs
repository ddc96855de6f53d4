//! Command line arguments and layered configuration loading.
//!
//! Precedence, lowest first: built-in defaults, the TOML file given with
//! `--config`, then flags and their environment variables.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use builder_proxy::{JwtSecret, ProxyConfig};
use clap::Parser;
use url::Url;

/// Engine API proxy that answers the builder API with the engine's own payloads
#[derive(Parser, Debug)]
#[command(name = "proxy-runtime", version)]
#[command(about = "Engine API proxy that impersonates a builder relay")]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Execution engine endpoint that engine traffic is forwarded to
    #[arg(long, env = "BUILDER_PROXY_ENGINE_URL")]
    pub engine_url: Option<Url>,

    /// Hex-encoded 32-byte Engine API JWT secret
    #[arg(
        long,
        env = "BUILDER_PROXY_JWT_SECRET",
        hide_env_values = true,
        conflicts_with = "jwt_secret_file"
    )]
    pub jwt_secret: Option<JwtSecret>,

    /// File holding the hex JWT secret, as written by the execution engine
    #[arg(long, value_name = "FILE")]
    pub jwt_secret_file: Option<PathBuf>,

    /// Listen address
    #[arg(long, env = "BUILDER_PROXY_HOST")]
    pub host: Option<IpAddr>,

    /// Listen port
    #[arg(short, long, env = "BUILDER_PROXY_PORT")]
    pub port: Option<u16>,

    #[arg(long)]
    pub capella_fork_epoch: Option<u64>,

    #[arg(long)]
    pub deneb_fork_epoch: Option<u64>,

    /// Tag written into the extra data of offered payloads
    #[arg(long)]
    pub extra_data: Option<String>,

    /// Bid the engine-reported block value instead of doubling it
    #[arg(long)]
    pub no_inflate_value: bool,

    /// Log filter directive, overrides RUST_LOG (e.g. "debug" or "builder_proxy=trace")
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// Apply flag and environment overrides on top of `config`.
    pub fn apply(&self, config: &mut ProxyConfig) -> Result<()> {
        if let Some(url) = &self.engine_url {
            config.engine.url = Some(url.clone());
        }
        if let Some(secret) = self.jwt_secret {
            config.engine.jwt_secret = Some(secret);
        }
        if let Some(path) = &self.jwt_secret_file {
            config.engine.jwt_secret = Some(read_jwt_secret(path)?);
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(epoch) = self.capella_fork_epoch {
            config.chain.capella_fork_epoch = epoch;
        }
        if let Some(epoch) = self.deneb_fork_epoch {
            config.chain.deneb_fork_epoch = epoch;
        }
        if let Some(extra_data) = &self.extra_data {
            config.bid.extra_data = extra_data.clone();
        }
        if self.no_inflate_value {
            config.bid.inflate_value = false;
        }
        Ok(())
    }
}

/// Build the effective configuration from defaults, file and arguments.
pub fn load_config(args: &Args) -> Result<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };
    args.apply(&mut config)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ProxyConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
}

fn read_jwt_secret(path: &Path) -> Result<JwtSecret> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read jwt secret file {}", path.display()))?;
    raw.parse()
        .with_context(|| format!("invalid jwt secret in {}", path.display()))
}
