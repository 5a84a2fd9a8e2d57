//! Shared types for the checkpoint pipeline.

use alloy_primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::{ChainFamily, Network};

// ─── RawLogEvent ──────────────────────────────────────────────────────────────

/// An L1 log as returned by `eth_getLogs`, before decoding. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEvent {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub tx_index: u64,
    pub log_index: u64,
}

impl RawLogEvent {
    /// Position of the log on L1, used for ordering.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

// ─── DecodedCheckpoint ────────────────────────────────────────────────────────

/// How a checkpoint identifies its L2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum L2Anchor {
    /// OP Stack outputs carry the L2 block number directly.
    BlockNumber(u64),
    /// Arbitrum send roots only carry the L2 block hash.
    BlockHash(B256),
}

/// A checkpoint event normalized across families.
///
/// Becomes a [`CheckpointRecord`] once its L2 anchor is a block number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedCheckpoint {
    pub family: ChainFamily,
    pub network: Network,
    pub anchor: L2Anchor,
    pub output_root: B256,
    pub l2_output_index: Option<u64>,
    pub l1_timestamp: Option<u64>,
    pub l1_block_number: u64,
    pub l1_block_hash: B256,
    pub l1_tx_hash: B256,
    pub l1_tx_index: u64,
    pub log_index: u64,
}

impl DecodedCheckpoint {
    /// The L2 block number, if the event carries it directly.
    pub fn l2_block_number(&self) -> Option<u64> {
        match self.anchor {
            L2Anchor::BlockNumber(n) => Some(n),
            L2Anchor::BlockHash(_) => None,
        }
    }

    pub fn l2_block_hash(&self) -> Option<B256> {
        match self.anchor {
            L2Anchor::BlockNumber(_) => None,
            L2Anchor::BlockHash(h) => Some(h),
        }
    }

    pub fn into_record(self, l2_block_number: u64, observed_at: DateTime<Utc>) -> CheckpointRecord {
        CheckpointRecord {
            family: self.family,
            network: self.network,
            l2_block_number,
            l2_output_index: self.l2_output_index,
            l2_block_hash: self.l2_block_hash(),
            output_root: self.output_root,
            l1_block_number: self.l1_block_number,
            l1_block_hash: self.l1_block_hash,
            l1_tx_hash: self.l1_tx_hash,
            l1_tx_index: self.l1_tx_index,
            log_index: self.log_index,
            l1_timestamp: self.l1_timestamp,
            observed_at,
        }
    }
}

// ─── CheckpointRecord ─────────────────────────────────────────────────────────

/// A persisted checkpoint. Unique per `(network, l2_block_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub family: ChainFamily,
    pub network: Network,
    pub l2_block_number: u64,
    /// OP Stack only.
    pub l2_output_index: Option<u64>,
    /// Arbitrum only.
    pub l2_block_hash: Option<B256>,
    pub output_root: B256,
    pub l1_block_number: u64,
    pub l1_block_hash: B256,
    pub l1_tx_hash: B256,
    pub l1_tx_index: u64,
    pub log_index: u64,
    /// L1 timestamp as emitted by the OP Stack event.
    pub l1_timestamp: Option<u64>,
    pub observed_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Returns `true` if `other` describes the same commitment.
    ///
    /// Bookkeeping fields like `observed_at` are ignored, so a re-scan of the
    /// same log is treated as a duplicate.
    pub fn same_commitment(&self, other: &CheckpointRecord) -> bool {
        self.network == other.network
            && self.l2_block_number == other.l2_block_number
            && self.output_root == other.output_root
    }

    pub fn l1_anchor(&self) -> L1Anchor {
        L1Anchor {
            block_number: self.l1_block_number,
            block_hash: self.l1_block_hash,
        }
    }
}

// ─── L1Anchor ─────────────────────────────────────────────────────────────────

/// An L1 block the store holds data for, used by the reorg re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct L1Anchor {
    pub block_number: u64,
    pub block_hash: B256,
}

// ─── BlockRange ───────────────────────────────────────────────────────────────

/// An inclusive L1 block range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Number of blocks covered (0 for an inverted range).
    pub fn len(&self) -> u64 {
        if self.to < self.from {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from && block <= self.to
    }

    /// Split into consecutive sub-ranges of at most `max_len` blocks.
    pub fn chunks(&self, max_len: u64) -> Vec<BlockRange> {
        let step = max_len.max(1);
        let mut out = Vec::new();
        let mut start = self.from;
        while start <= self.to {
            let end = start.saturating_add(step - 1).min(self.to);
            out.push(BlockRange::new(start, end));
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        out
    }
}

impl std::fmt::Display for BlockRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

// ─── ApplyOutcome ─────────────────────────────────────────────────────────────

/// Result of persisting one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Rows newly written.
    pub inserted: usize,
    /// Rows that already existed with the same output root.
    pub unchanged: usize,
}
