//! Log subscriber setup.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_DIRECTIVE: &str = "info";

/// Filter from an explicit directive, else `RUST_LOG`, else `info`.
pub fn filter(directive: Option<&str>) -> Result<EnvFilter> {
    match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter {directive:?}")),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
    }
}

/// Install the global subscriber.
pub fn init(directive: Option<&str>, json: bool) -> Result<()> {
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter(directive)?)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
