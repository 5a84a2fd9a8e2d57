//! Runs one monitor task per network.

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use l2index_core::{IndexerError, MonitorStatus, Network};

use crate::monitor::Monitor;

/// Owns the worker tasks. Workers share nothing but the store.
pub struct Supervisor {
    shutdown: CancellationToken,
    tasks: JoinSet<(Network, Result<MonitorStatus, IndexerError>)>,
    statuses: Vec<watch::Receiver<MonitorStatus>>,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            tasks: JoinSet::new(),
            statuses: Vec::new(),
        }
    }

    /// Token to build monitors with, so that [`shutdown`](Self::shutdown)
    /// reaches them.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn spawn(&mut self, monitor: Monitor) {
        let network = monitor.network();
        self.statuses.push(monitor.subscribe());
        self.tasks.spawn(async move { (network, monitor.run().await) });
        info!(network = %network, "worker spawned");
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Latest status of every worker.
    pub fn statuses(&self) -> Vec<MonitorStatus> {
        self.statuses.iter().map(|rx| rx.borrow().clone()).collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for every worker to finish.
    pub async fn join(mut self) -> Vec<(Option<Network>, Result<MonitorStatus, IndexerError>)> {
        let mut results = Vec::with_capacity(self.statuses.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((network, result)) => {
                    if let Err(e) = &result {
                        error!(network = %network, error = %e, "worker failed");
                    }
                    results.push((Some(network), result));
                }
                Err(e) => {
                    error!(error = %e, "worker panicked");
                    results.push((None, Err(IndexerError::Other(format!("worker task: {e}")))));
                }
            }
        }
        results
    }
}
