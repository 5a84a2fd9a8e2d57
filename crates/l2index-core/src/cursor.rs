//! Scan cursor: tracks how far a network has been scanned on L1.

use alloy_primitives::B256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainFamily, Network};

/// The monitor's position on L1 for one `(family, network)` pair.
///
/// Every block up to and including `block_number` has been scanned and its
/// checkpoints are committed. The cursor only moves backwards through a
/// rewind (reorg correction or operator backfill).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub family: ChainFamily,
    pub network: Network,
    /// Last fully scanned L1 block.
    pub block_number: u64,
    /// Hash of `block_number`, when known.
    pub block_hash: Option<B256>,
    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    pub fn new(family: ChainFamily, network: Network, block_number: u64) -> Self {
        Self {
            family,
            network,
            block_number,
            block_hash: None,
            updated_at: Utc::now(),
        }
    }

    /// Cursor for a network that has never been scanned: positioned just
    /// before `start_block` so that `start_block` is the first block scanned.
    pub fn starting_at(family: ChainFamily, network: Network, start_block: u64) -> Self {
        Self::new(family, network, start_block.saturating_sub(1))
    }

    /// The cursor after a range ending at `block_number` has been committed.
    pub fn advanced(&self, block_number: u64, block_hash: Option<B256>) -> Self {
        Self {
            family: self.family,
            network: self.network,
            block_number,
            block_hash,
            updated_at: Utc::now(),
        }
    }

    /// Returns the next block to scan (cursor + 1).
    pub fn next_block(&self) -> u64 {
        self.block_number.saturating_add(1)
    }
}
