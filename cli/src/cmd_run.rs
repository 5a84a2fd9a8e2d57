//! `l2index run`: one worker task per configured network.

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use l2index_monitor::{MonitorBuilder, Supervisor};

use crate::config::AppConfig;

pub async fn run(config: AppConfig) -> Result<()> {
    config.validate()?;

    let shutdown = CancellationToken::new();
    let mut supervisor = Supervisor::new(shutdown.clone());
    for monitor_config in config.monitors {
        let network = monitor_config.network;
        let monitor = MonitorBuilder::from_config(monitor_config)
            .shutdown(supervisor.token())
            .build()
            .await
            .with_context(|| format!("start monitor for {network}"))?;
        supervisor.spawn(monitor);
    }
    info!(workers = supervisor.len(), "all monitors started");

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested, stopping monitors");
        shutdown.cancel();
    });

    let mut failed = 0;
    for (network, result) in supervisor.join().await {
        match result {
            Ok(status) => info!(
                network = %status.network,
                cursor = ?status.cursor,
                records_written = status.records_written,
                reorgs = status.reorgs,
                "monitor finished"
            ),
            Err(e) => {
                failed += 1;
                warn!(network = ?network.map(|n| n.to_string()), error = %e, "monitor failed");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} monitor(s) stopped with an error");
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
