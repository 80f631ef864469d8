//! Rollup client entry point
//!
//! Loads configuration, registers the client's instruments and serves them
//! over HTTP until Ctrl-C.

mod cli;

use std::future::Future;
use std::io;
use std::sync::Arc;

use clap::Parser;
use rollup_client_config::{validate_config, ConfigLoader, ENV_PREFIX};
use rollup_client_metrics::{init_tracing, start, ClientMetrics, Registry};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX)?,
        None => ConfigLoader::from_env()?,
    };
    args.apply(&mut config);
    validate_config(&config)?;

    init_tracing(&config.logging.level, config.logging.json)?;

    let registry = Arc::new(Registry::new());
    // Handed to the driver, proposer and prover once they are wired in.
    let _metrics = ClientMetrics::register(&registry)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    let metrics_config = &config.metrics;
    let outcome = start(
        metrics_config.enabled,
        &metrics_config.host,
        metrics_config.port,
        registry,
        cancel.clone(),
    )
    .await?;
    info!(?outcome, "metrics server stopped");

    // Nothing else runs yet; with metrics disabled, wait for the signal.
    cancel.cancelled().await;
    Ok(())
}

/// Cancel `cancel` once `signal` resolves, including when the signal handler
/// could not be installed.
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal, shutting down"),
    }
    cancel.cancel();
}
