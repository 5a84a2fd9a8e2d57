//! Reorg detection and rewind planning.
//!
//! Two triggers lead here:
//! 1. **Hash mismatch**: a stored L1 anchor no longer matches the canonical
//!    chain during the periodic re-check of the last `recheck_depth` blocks.
//! 2. **Output conflict**: a fresh record disagrees with a stored one whose L1
//!    block has since become non-canonical.
//!
//! Either way the correction is the same: delete everything above
//! `first_invalid − 1` and move the cursor there, unless that exceeds
//! `max_rewind`.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::chain::Network;
use crate::error::IndexerError;
use crate::types::{BlockRange, L1Anchor};

/// Describes a detected (and corrected) L1 reorganization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorgEvent {
    pub network: Network,
    /// Lowest L1 block found to be non-canonical.
    pub first_invalid: u64,
    /// New cursor position.
    pub rewind_to: u64,
    /// Number of blocks rolled back.
    pub depth: u64,
    /// Records deleted by the rewind.
    pub deleted: u64,
    pub kind: ReorgKind,
}

/// What triggered the rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorgKind {
    HashMismatch,
    OutputConflict,
    Operator,
}

impl std::fmt::Display for ReorgKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HashMismatch => write!(f, "hash mismatch"),
            Self::OutputConflict => write!(f, "output conflict"),
            Self::Operator => write!(f, "operator rewind"),
        }
    }
}

/// A validated rewind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindPlan {
    pub first_invalid: u64,
    pub target: u64,
    pub depth: u64,
}

/// Schedules hash re-checks and validates rewinds against `max_rewind`.
#[derive(Debug, Clone)]
pub struct ReorgGuard {
    recheck_depth: u64,
    recheck_interval: u32,
    max_rewind: u64,
    /// `None` until the first (startup) check has run.
    cycles_since_check: Option<u32>,
}

impl ReorgGuard {
    pub fn new(recheck_depth: u64, recheck_interval: u32, max_rewind: u64) -> Self {
        Self {
            recheck_depth,
            recheck_interval,
            max_rewind,
            cycles_since_check: None,
        }
    }

    pub fn max_rewind(&self) -> u64 {
        self.max_rewind
    }

    /// Returns `true` if a hash re-check should run this cycle.
    pub fn is_due(&self) -> bool {
        if self.recheck_depth == 0 {
            return false;
        }
        match self.cycles_since_check {
            None => true,
            Some(n) => n >= self.recheck_interval,
        }
    }

    /// Record one completed scan cycle.
    pub fn tick(&mut self) {
        if let Some(n) = self.cycles_since_check.as_mut() {
            *n = n.saturating_add(1);
        }
    }

    pub fn mark_checked(&mut self) {
        self.cycles_since_check = Some(0);
    }

    /// The L1 blocks to re-check for a cursor at `cursor`.
    pub fn window(&self, cursor: u64) -> Option<BlockRange> {
        if self.recheck_depth == 0 || cursor == 0 {
            return None;
        }
        let from = cursor.saturating_sub(self.recheck_depth - 1).max(1);
        Some(BlockRange::new(from, cursor))
    }

    /// Lowest anchor whose canonical hash differs from the stored one.
    ///
    /// A block the node no longer returns (`None`) counts as a mismatch.
    pub fn first_mismatch(checked: &[(L1Anchor, Option<B256>)]) -> Option<L1Anchor> {
        checked
            .iter()
            .filter(|(anchor, canonical)| *canonical != Some(anchor.block_hash))
            .map(|(anchor, _)| *anchor)
            .min_by_key(|anchor| anchor.block_number)
    }

    /// Plan a rewind for a cursor at `cursor` given the lowest invalid block.
    ///
    /// The target must lie below the cursor; anything else would move the
    /// cursor past blocks whose records were never committed.
    pub fn plan(&self, cursor: u64, first_invalid: u64) -> Result<RewindPlan, IndexerError> {
        let target = first_invalid.saturating_sub(1);
        if target >= cursor {
            tracing::error!(cursor, first_invalid, target, "Rewind target not below cursor, refusing");
            return Err(IndexerError::RewindAhead { target, cursor });
        }
        let depth = cursor - target;
        if depth > self.max_rewind {
            tracing::error!(
                cursor,
                first_invalid,
                depth,
                max_rewind = self.max_rewind,
                "Reorg deeper than max rewind, not rewinding"
            );
            return Err(IndexerError::ReorgTooDeep {
                target,
                depth,
                max: self.max_rewind,
            });
        }
        Ok(RewindPlan {
            first_invalid,
            target,
            depth,
        })
    }
}
