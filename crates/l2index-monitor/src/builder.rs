//! Fluent builder for [`Monitor`].
//!
//! # Example
//!
//! ```rust,no_run
//! use l2index_core::{ChainName, L1Network, Network};
//! use l2index_monitor::MonitorBuilder;
//!
//! # async fn example() -> Result<(), l2index_core::IndexerError> {
//! let monitor = MonitorBuilder::new(Network::new(ChainName::Base, L1Network::Sepolia))
//!     .rpc_urls(["https://rpc.sepolia.org", "https://backup.example"])
//!     .store_url("sqlite:./l2index.db?mode=rwc")
//!     .start_block(5_000_000)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use l2index_core::{
    ChainFamily, CheckpointStore, IndexerError, MonitorConfig, Network, RetrySettings,
};
use l2index_rpc::{eth_client, EthClient, RetryConfig};

use crate::fetcher::{L1Rpc, L2Rpc};
use crate::monitor::Monitor;
use crate::scanner::Scanner;

/// Builds a [`Monitor`] from a [`MonitorConfig`], connecting whatever was not
/// supplied directly (RPC clients from URLs, the store from `store_url`).
pub struct MonitorBuilder {
    config: MonitorConfig,
    store: Option<Arc<dyn CheckpointStore>>,
    l1: Option<Arc<dyn L1Rpc>>,
    l2: Option<Arc<dyn L2Rpc>>,
    shutdown: Option<CancellationToken>,
}

impl MonitorBuilder {
    pub fn new(network: Network) -> Self {
        Self::from_config(MonitorConfig::new(network, Vec::new()))
    }

    pub fn from_config(config: MonitorConfig) -> Self {
        Self {
            config,
            store: None,
            l1: None,
            l2: None,
            shutdown: None,
        }
    }

    /// L1 endpoints, tried in order.
    pub fn rpc_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.rpc_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// L2 endpoints (Arbitrum block hash resolution).
    pub fn l2_rpc_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.l2_rpc_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.config.store_url = Some(url.into());
        self
    }

    /// Override the built-in checkpoint contract.
    pub fn contract(mut self, contract: Address) -> Self {
        self.config.contract = Some(contract);
        self
    }

    /// First L1 block to scan when nothing is stored yet.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = Some(block);
        self
    }

    /// Blocks behind head before a range is scanned.
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.config.confirmation_depth = Some(depth);
        self
    }

    pub fn max_chunk_blocks(mut self, blocks: u64) -> Self {
        self.config.max_chunk_blocks = blocks;
        self
    }

    /// Widest range the provider accepts for `eth_getLogs`.
    pub fn max_log_range(mut self, blocks: u64) -> Self {
        self.config.max_log_range = blocks;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn recheck(mut self, depth: u64, interval: u32) -> Self {
        self.config.recheck_depth = depth;
        self.config.recheck_interval = interval;
        self
    }

    pub fn max_rewind(mut self, blocks: u64) -> Self {
        self.config.max_rewind = blocks;
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.config.retry = retry;
        self
    }

    /// Use an existing store instead of connecting to `store_url`.
    pub fn store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use an existing L1 client instead of the configured URLs.
    pub fn l1(mut self, l1: Arc<dyn L1Rpc>) -> Self {
        self.l1 = Some(l1);
        self
    }

    pub fn l2(mut self, l2: Arc<dyn L2Rpc>) -> Self {
        self.l2 = Some(l2);
        self
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// The configuration as built so far.
    pub fn build_config(self) -> MonitorConfig {
        self.config
    }

    /// Validate the configuration and connect everything that is missing.
    pub async fn build(self) -> Result<Monitor, IndexerError> {
        let config = self.config;
        let shutdown = self.shutdown.unwrap_or_default();
        if self.l1.is_none() {
            config.validate()?;
        }
        let descriptor = config.descriptor()?;

        let l1 = match self.l1 {
            Some(l1) => l1,
            None => Arc::new(http_client(&config, &config.rpc_urls, &shutdown)?) as Arc<dyn L1Rpc>,
        };

        let l2 = match (self.l2, descriptor.family) {
            (Some(l2), _) => Some(l2),
            (None, ChainFamily::Arbitrum) => {
                if config.l2_rpc_urls.iter().all(|u| u.trim().is_empty()) {
                    return Err(IndexerError::Configuration(format!(
                        "{}: arbitrum networks need an L2 RPC URL",
                        config.network
                    )));
                }
                Some(Arc::new(http_client(&config, &config.l2_rpc_urls, &shutdown)?) as Arc<dyn L2Rpc>)
            }
            (None, ChainFamily::OpStack) => None,
        };

        let store = match self.store {
            Some(store) => store,
            None => {
                let url = config.store_url.as_deref().ok_or_else(|| {
                    IndexerError::Configuration(format!("{}: no store configured", config.network))
                })?;
                l2index_storage::connect(url).await?
            }
        };

        debug!(
            network = %config.network,
            contract = %descriptor.contract,
            endpoints = config.rpc_urls.len(),
            "monitor built"
        );

        let scanner = Scanner::new(
            descriptor.clone(),
            l1,
            l2,
            config.max_log_range,
            config.fetch_concurrency,
        );
        Ok(Monitor::new(config, descriptor, scanner, store, shutdown))
    }
}

fn http_client(
    config: &MonitorConfig,
    urls: &[String],
    shutdown: &CancellationToken,
) -> Result<EthClient, IndexerError> {
    eth_client(
        urls,
        RetryConfig::from(&config.retry),
        Duration::from_millis(config.request_timeout_ms),
        config.max_log_range,
        shutdown.clone(),
    )
    .map_err(|e| IndexerError::Configuration(format!("{}: {e}", config.network)))
}
