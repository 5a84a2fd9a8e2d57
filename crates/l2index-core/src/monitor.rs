//! Monitor configuration and state types.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainDescriptor, ChainFamily, Network};
use crate::error::IndexerError;

/// Configuration for one monitored network. Immutable once the monitor starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub network: Network,
    /// Overrides the built-in contract address. Required for goerli networks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,
    /// Overrides the built-in deployment block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_block: Option<u64>,
    /// L1 endpoints, tried in order.
    pub rpc_urls: Vec<String>,
    /// L2 endpoints, used by arbitrum to resolve block hashes.
    #[serde(default)]
    pub l2_rpc_urls: Vec<String>,
    /// Overrides the shared store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_url: Option<String>,
    /// First L1 block to scan when no cursor is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_block: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overrides the family default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_depth: Option<u64>,
    /// Upper bound on blocks scanned per cycle.
    #[serde(default = "default_max_chunk_blocks")]
    pub max_chunk_blocks: u64,
    /// Widest range the provider accepts for one `eth_getLogs`.
    #[serde(default = "default_max_log_range")]
    pub max_log_range: u64,
    /// Concurrent `eth_getLogs` calls per cycle.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// L1 blocks below the cursor re-checked for reorgs.
    #[serde(default = "default_recheck_depth")]
    pub recheck_depth: u64,
    /// Cycles between reorg re-checks.
    #[serde(default = "default_recheck_interval")]
    pub recheck_interval: u32,
    #[serde(default = "default_max_rewind")]
    pub max_rewind: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_poll_interval_ms() -> u64 {
    12_000
}
fn default_max_chunk_blocks() -> u64 {
    2_000
}
fn default_max_log_range() -> u64 {
    1_000
}
fn default_fetch_concurrency() -> usize {
    4
}
fn default_recheck_depth() -> u64 {
    128
}
fn default_recheck_interval() -> u32 {
    10
}
fn default_max_rewind() -> u64 {
    1_024
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

impl MonitorConfig {
    /// Config with defaults for everything but the network and L1 endpoints.
    pub fn new(network: Network, rpc_urls: Vec<String>) -> Self {
        Self {
            network,
            contract: None,
            deployment_block: None,
            rpc_urls,
            l2_rpc_urls: Vec::new(),
            store_url: None,
            start_block: None,
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_depth: None,
            max_chunk_blocks: default_max_chunk_blocks(),
            max_log_range: default_max_log_range(),
            fetch_concurrency: default_fetch_concurrency(),
            recheck_depth: default_recheck_depth(),
            recheck_interval: default_recheck_interval(),
            max_rewind: default_max_rewind(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetrySettings::default(),
        }
    }

    pub fn family(&self) -> ChainFamily {
        self.network.family()
    }

    /// Built-in descriptor with configuration overrides applied, validated.
    pub fn descriptor(&self) -> Result<ChainDescriptor, IndexerError> {
        let mut descriptor = match (ChainDescriptor::builtin(self.network), self.contract) {
            (Some(builtin), Some(contract)) => ChainDescriptor { contract, ..builtin },
            (None, Some(contract)) => ChainDescriptor::new(self.network, contract, 0),
            (Some(builtin), None) => builtin,
            (None, None) => {
                return Err(IndexerError::Configuration(format!(
                    "{}: no built-in contract, set `contract`",
                    self.network
                )))
            }
        };
        if let Some(block) = self.deployment_block {
            descriptor.deployment_block = block;
        }
        if let Some(depth) = self.confirmation_depth {
            descriptor.confirmation_depth = depth;
        }
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), IndexerError> {
        let fail = |msg: &str| -> Result<(), IndexerError> {
            Err(IndexerError::Configuration(format!("{}: {msg}", self.network)))
        };

        if self.rpc_urls.iter().all(|u| u.trim().is_empty()) {
            return fail("at least one L1 RPC URL is required");
        }
        if self.family() == ChainFamily::Arbitrum
            && self.l2_rpc_urls.iter().all(|u| u.trim().is_empty())
        {
            return fail("arbitrum networks need an L2 RPC URL");
        }
        if self.max_chunk_blocks == 0 || self.max_log_range == 0 {
            return fail("max_chunk_blocks and max_log_range must be positive");
        }
        if self.fetch_concurrency == 0 {
            return fail("fetch_concurrency must be positive");
        }
        if self.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be positive");
        }
        self.retry.validate().map_err(|e| {
            IndexerError::Configuration(format!("{}: {e}", self.network))
        })?;
        self.descriptor().map(|_| ())
    }

    /// Cursor position for a network with nothing stored yet.
    pub fn initial_cursor_block(&self, descriptor: &ChainDescriptor) -> u64 {
        self.start_block
            .unwrap_or(descriptor.deployment_block)
            .saturating_sub(1)
    }
}

/// Retry and backoff settings, shared by the RPC client and the monitor loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries per endpoint before failing over (attempts = retries + 1).
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Random jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_fraction: f64,
    /// Cap on the monitor loop's backoff after a failed cycle.
    pub loop_max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
            jitter_fraction: 0.1,
            loop_max_backoff_ms: 60_000,
        }
    }
}

impl RetrySettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.multiplier < 1.0 {
            return Err("retry.multiplier must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err("retry.jitter_fraction must be within 0..=1".into());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err("retry.initial_backoff_ms exceeds retry.max_backoff_ms".into());
        }
        Ok(())
    }
}

/// Runtime state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Waiting for the next poll.
    Idle,
    /// Fetching head and logs.
    Scanning,
    Decoding,
    /// Writing the batch and cursor.
    Persisting,
    /// Waiting after a transient failure.
    Backoff,
    ReorgRecovery,
    Stopped,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Decoding => write!(f, "decoding"),
            Self::Persisting => write!(f, "persisting"),
            Self::Backoff => write!(f, "backoff"),
            Self::ReorgRecovery => write!(f, "reorg-recovery"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Point-in-time view of a running monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub network: Network,
    pub state: MonitorState,
    pub cursor: Option<u64>,
    pub head: Option<u64>,
    pub records_written: u64,
    pub logs_skipped: u64,
    pub backoffs: u64,
    pub reorgs: u64,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MonitorStatus {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            state: MonitorState::Idle,
            cursor: None,
            head: None,
            records_written: 0,
            logs_skipped: 0,
            backoffs: 0,
            reorgs: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }
}
