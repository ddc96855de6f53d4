//! # Proxy Runtime
//!
//! Process-level plumbing for the builder proxy: argument parsing, layered
//! configuration, log setup and signal handling. The entry point is
//! `main.rs`; the pieces live here so they can be tested.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod logging;

pub use cli::{load_config, Args};

use tracing::{info, warn};

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("received Ctrl+C, shutting down");
}
