//! Error types for the checkpoint monitor.

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Errors produced while turning a single raw log into a checkpoint.
///
/// A decode error only ever affects the offending log: the monitor skips it,
/// reports it and keeps going with the rest of the range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected} topics, got {got}")]
    TopicCount { expected: usize, got: usize },

    #[error("unexpected event signature {got} (expected {expected})")]
    UnexpectedSignature { expected: B256, got: B256 },

    #[error("log emitted by {got}, expected {expected}")]
    UnexpectedEmitter { expected: Address, got: Address },

    #[error("expected {expected} bytes of log data, got {got}")]
    DataLength { expected: usize, got: usize },

    #[error("field '{field}' does not fit in u64: {value}")]
    NumericOverflow { field: &'static str, value: U256 },

    #[error("log is missing '{field}'")]
    MissingField { field: &'static str },

    #[error("ABI decode failed: {reason}")]
    Abi { reason: String },

    #[error("L2 block {hash} is unknown to the L2 node")]
    UnknownL2Block { hash: B256 },
}

/// Errors that can occur while monitoring a network.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// RPC endpoints timed out, rate limited or returned 5xx after all retries.
    #[error("RPC unavailable: {0}")]
    TransientUnavailable(String),

    /// The RPC node rejected the request in a way retries will not fix.
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Reorg detected at L1 block {block_number}: stored hash {stored}, canonical {canonical:?}")]
    ReorgDetected {
        block_number: u64,
        stored: B256,
        canonical: Option<B256>,
    },

    #[error(
        "Conflicting output root for {network} L2 block {l2_block_number}: \
         stored {stored_root} (L1 block {stored_l1_block}), observed {observed_root}"
    )]
    Conflict {
        network: String,
        l2_block_number: u64,
        stored_root: B256,
        stored_l1_block: u64,
        observed_root: B256,
    },

    #[error("Rewind to block {target} ({depth} blocks) exceeds max rewind of {max} blocks")]
    ReorgTooDeep { target: u64, depth: u64, max: u64 },

    /// A rewind target at or above the cursor would skip unscanned blocks.
    #[error("Rewind target {target} is not below the cursor at {cursor}")]
    RewindAhead { target: u64, cursor: u64 },

    /// The stored cursor changed while a batch was in flight (operator
    /// backfill or a second writer). The batch was not written.
    #[error("Cursor for {network} moved to {found} while a batch scanned from {expected} was in flight")]
    CursorMoved {
        network: String,
        expected: u64,
        found: u64,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` for failures the monitor retries in place after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientUnavailable(_)
                | Self::StorageUnavailable(_)
                | Self::Rpc(_)
                | Self::CursorMoved { .. }
        )
    }

    /// Returns `true` if the error must be routed to the reorg-correction path.
    pub fn is_reorg(&self) -> bool {
        matches!(self, Self::ReorgDetected { .. } | Self::Conflict { .. })
    }

    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransientUnavailable(_) => "transient_unavailable",
            Self::Rpc(_) => "rpc",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Decode(_) => "decode",
            Self::ReorgDetected { .. } => "reorg_detected",
            Self::Conflict { .. } => "conflict",
            Self::ReorgTooDeep { .. } => "reorg_too_deep",
            Self::RewindAhead { .. } => "rewind_ahead",
            Self::CursorMoved { .. } => "cursor_moved",
            Self::Configuration(_) => "configuration",
            Self::Other(_) => "other",
        }
    }
}
