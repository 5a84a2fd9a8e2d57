//! Storage trait for checkpoints and scan cursors.
//!
//! A single store is shared by every monitor in a deployment, possibly across
//! processes. Records are partitioned by network. Cursor updates are
//! compare-and-swap, so a second writer or an operator rewind is detected
//! instead of being overwritten.

use async_trait::async_trait;

use crate::chain::{ChainFamily, Network};
use crate::cursor::Cursor;
use crate::error::IndexerError;
use crate::types::{ApplyOutcome, CheckpointRecord, L1Anchor};

/// Trait for persisting checkpoint records together with the scan cursor.
///
/// Implementations include `MemoryStore`, `SqliteStore` and `PostgresStore`.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the cursor for a `(family, network)` pair.
    async fn load_cursor(
        &self,
        family: ChainFamily,
        network: Network,
    ) -> Result<Option<Cursor>, IndexerError>;

    /// All stored cursors, ordered by network.
    async fn list_cursors(&self) -> Result<Vec<Cursor>, IndexerError>;

    /// Insert `records` and move the cursor from `expected_block` to `cursor`
    /// in one transaction.
    ///
    /// A record whose key already exists with the same output root counts as
    /// unchanged. A different output root aborts the whole batch with
    /// [`IndexerError::Conflict`]. If a cursor is stored and is not at
    /// `expected_block`, nothing is written and [`IndexerError::CursorMoved`]
    /// is returned.
    async fn apply_batch(
        &self,
        expected_block: u64,
        cursor: &Cursor,
        records: &[CheckpointRecord],
    ) -> Result<ApplyOutcome, IndexerError>;

    /// Delete records with `l1_block_number > to_block` and set the cursor to
    /// `to_block`, atomically. Returns the number of deleted records.
    async fn rewind(
        &self,
        family: ChainFamily,
        network: Network,
        to_block: u64,
    ) -> Result<u64, IndexerError>;

    /// Distinct L1 blocks in `from..=to` that stored records point at.
    async fn anchors_between(
        &self,
        network: Network,
        from: u64,
        to: u64,
    ) -> Result<Vec<L1Anchor>, IndexerError>;

    /// First checkpoint with `l2_block_number >= l2_block_number`.
    async fn find_checkpoint(
        &self,
        network: Network,
        l2_block_number: u64,
    ) -> Result<Option<CheckpointRecord>, IndexerError>;

    /// Checkpoint with the highest L2 block number.
    async fn latest_checkpoint(
        &self,
        network: Network,
    ) -> Result<Option<CheckpointRecord>, IndexerError>;

    async fn count(&self, network: Network) -> Result<u64, IndexerError>;
}
