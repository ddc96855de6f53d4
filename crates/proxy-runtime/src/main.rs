//! # Builder Proxy
//!
//! Sits between a consensus client and its execution engine. Point the
//! consensus client's engine endpoint and its builder endpoint at this
//! process; engine traffic is forwarded to `--engine-url` and builder
//! requests are answered with bids for the engine's own payloads.
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments and install the log subscriber
//! 2. Load configuration (defaults → `--config` file → flags/env)
//! 3. Build the service (fresh BLS key, engine client)
//! 4. Serve until SIGINT/SIGTERM, then drain open connections

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use builder_proxy::BuilderProxyService;
use proxy_runtime::{load_config, logging, shutdown_signal, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level.as_deref(), args.log_json)?;

    let config = load_config(&args)?;
    info!(
        version = builder_proxy::VERSION,
        listen = %config.server.address(),
        capella_fork_epoch = config.chain.capella_fork_epoch,
        deneb_fork_epoch = config.chain.deneb_fork_epoch,
        jwt = config.engine.jwt_secret.is_some(),
        "starting builder proxy"
    );

    let service = BuilderProxyService::new(config).context("failed to initialize builder proxy")?;
    service
        .start(shutdown_signal())
        .await
        .context("builder proxy stopped with an error")?;

    info!(metrics = %service.metrics().to_json(), "builder proxy stopped");
    Ok(())
}
