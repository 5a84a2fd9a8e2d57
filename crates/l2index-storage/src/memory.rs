//! In-memory storage backend.
//!
//! Keeps checkpoints and cursors in RAM. Batches are staged on a copy of the
//! network's partition and swapped in on success, which gives the same
//! all-or-nothing behaviour as the SQL backends. Failures can be injected to
//! exercise the monitor's backoff and atomicity paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use l2index_core::{
    ApplyOutcome, ChainFamily, CheckpointRecord, CheckpointStore, Cursor, IndexerError, L1Anchor,
    Network,
};

#[derive(Default)]
struct State {
    checkpoints: HashMap<Network, BTreeMap<u64, CheckpointRecord>>,
    cursors: HashMap<(ChainFamily, Network), Cursor>,
}

#[derive(Default)]
struct Faults {
    /// Every operation fails while set.
    unavailable: bool,
    /// The next `apply_batch` fails after staging this many records.
    fail_apply_after: Option<usize>,
}

/// In-memory checkpoint store. All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation return `StorageUnavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.unavailable = unavailable;
        }
    }

    /// Make the next `apply_batch` fail after `records` records were staged.
    pub fn fail_next_apply_after(&self, records: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_apply_after = Some(records);
        }
    }

    /// All stored records for `network`, ordered by L2 block.
    pub fn records(&self, network: Network) -> Vec<CheckpointRecord> {
        self.state
            .lock()
            .map(|s| {
                s.checkpoints
                    .get(&network)
                    .map(|p| p.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, IndexerError> {
        self.check_available()?;
        self.state
            .lock()
            .map_err(|_| IndexerError::StorageUnavailable("memory store lock poisoned".into()))
    }

    fn check_available(&self) -> Result<(), IndexerError> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| IndexerError::StorageUnavailable("memory store lock poisoned".into()))?;
        if faults.unavailable {
            return Err(IndexerError::StorageUnavailable("injected outage".into()));
        }
        Ok(())
    }

    fn take_apply_fault(&self) -> Option<usize> {
        self.faults.lock().ok().and_then(|mut f| f.fail_apply_after.take())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_cursor(
        &self,
        family: ChainFamily,
        network: Network,
    ) -> Result<Option<Cursor>, IndexerError> {
        Ok(self.state()?.cursors.get(&(family, network)).cloned())
    }

    async fn list_cursors(&self) -> Result<Vec<Cursor>, IndexerError> {
        let mut cursors: Vec<Cursor> = self.state()?.cursors.values().cloned().collect();
        cursors.sort_by_key(|c| c.network.to_string());
        Ok(cursors)
    }

    async fn apply_batch(
        &self,
        expected_block: u64,
        cursor: &Cursor,
        records: &[CheckpointRecord],
    ) -> Result<ApplyOutcome, IndexerError> {
        let fail_after = self.take_apply_fault();
        let mut state = self.state()?;

        let key = (cursor.family, cursor.network);
        if let Some(stored) = state.cursors.get(&key) {
            if stored.block_number != expected_block {
                return Err(IndexerError::CursorMoved {
                    network: cursor.network.to_string(),
                    expected: expected_block,
                    found: stored.block_number,
                });
            }
        }

        let mut staged = state.checkpoints.get(&cursor.network).cloned().unwrap_or_default();
        let mut outcome = ApplyOutcome::default();

        for (i, record) in records.iter().enumerate() {
            if fail_after == Some(i) {
                return Err(IndexerError::StorageUnavailable(format!(
                    "injected failure after {i} records"
                )));
            }
            match staged.get(&record.l2_block_number) {
                None => {
                    staged.insert(record.l2_block_number, record.clone());
                    outcome.inserted += 1;
                }
                Some(existing) if existing.output_root == record.output_root => {
                    outcome.unchanged += 1;
                }
                Some(existing) => {
                    return Err(IndexerError::Conflict {
                        network: cursor.network.to_string(),
                        l2_block_number: record.l2_block_number,
                        stored_root: existing.output_root,
                        stored_l1_block: existing.l1_block_number,
                        observed_root: record.output_root,
                    });
                }
            }
        }
        if fail_after.is_some_and(|n| n >= records.len()) {
            return Err(IndexerError::StorageUnavailable(
                "injected failure before commit".into(),
            ));
        }

        state.checkpoints.insert(cursor.network, staged);
        state.cursors.insert(key, cursor.clone());
        Ok(outcome)
    }

    async fn rewind(
        &self,
        family: ChainFamily,
        network: Network,
        to_block: u64,
    ) -> Result<u64, IndexerError> {
        let mut state = self.state()?;
        let mut deleted = 0u64;
        if let Some(partition) = state.checkpoints.get_mut(&network) {
            let before = partition.len();
            partition.retain(|_, r| r.l1_block_number <= to_block);
            deleted = (before - partition.len()) as u64;
        }
        state
            .cursors
            .insert((family, network), Cursor::new(family, network, to_block));
        Ok(deleted)
    }

    async fn anchors_between(
        &self,
        network: Network,
        from: u64,
        to: u64,
    ) -> Result<Vec<L1Anchor>, IndexerError> {
        let state = self.state()?;
        let mut anchors: Vec<L1Anchor> = state
            .checkpoints
            .get(&network)
            .map(|p| {
                p.values()
                    .filter(|r| r.l1_block_number >= from && r.l1_block_number <= to)
                    .map(|r| r.l1_anchor())
                    .collect()
            })
            .unwrap_or_default();
        anchors.sort();
        anchors.dedup();
        Ok(anchors)
    }

    async fn find_checkpoint(
        &self,
        network: Network,
        l2_block_number: u64,
    ) -> Result<Option<CheckpointRecord>, IndexerError> {
        let state = self.state()?;
        Ok(state
            .checkpoints
            .get(&network)
            .and_then(|p| p.range(l2_block_number..).next().map(|(_, r)| r.clone())))
    }

    async fn latest_checkpoint(
        &self,
        network: Network,
    ) -> Result<Option<CheckpointRecord>, IndexerError> {
        let state = self.state()?;
        Ok(state
            .checkpoints
            .get(&network)
            .and_then(|p| p.values().next_back().cloned()))
    }

    async fn count(&self, network: Network) -> Result<u64, IndexerError> {
        let state = self.state()?;
        Ok(state.checkpoints.get(&network).map_or(0, |p| p.len() as u64))
    }
}
