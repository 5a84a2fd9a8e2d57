//! The per-network monitor loop.
//!
//! One cycle:
//! 1. load the cursor (stored, else the configured start)
//! 2. re-check recent L1 anchors when the [`ReorgGuard`] says so
//! 3. pick the next confirmation-safe range and scan it
//! 4. write the records and the advanced cursor in one transaction
//!
//! Transient RPC and storage failures put the loop into `Backoff`; the same
//! range is retried afterwards. Shutdown is only observed between stages,
//! never inside a store transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use l2index_core::{
    ApplyOutcome, BlockRange, ChainDescriptor, CheckpointRecord, CheckpointStore, Cursor,
    IndexerError, L1Anchor, MonitorConfig, MonitorState, MonitorStatus, Network, ReorgEvent,
    ReorgGuard, ReorgKind, RewindPlan,
};
use l2index_rpc::{RetryConfig, RetryPolicy};

use crate::scanner::{next_range, Scanner};

/// What one call to [`Monitor::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A range was scanned and committed.
    Progressed {
        range: BlockRange,
        outcome: ApplyOutcome,
        skipped: usize,
    },
    /// Nothing to scan below the safe head.
    CaughtUp { head: u64 },
    /// Stored data was rolled back; the next cycle rescans.
    Rewound(ReorgEvent),
    /// Shutdown was requested before the cycle touched the chain.
    Stopped,
}

enum Persisted {
    Committed { outcome: ApplyOutcome, dropped: usize },
    Rewound(ReorgEvent),
}

pub struct Monitor {
    config: MonitorConfig,
    descriptor: ChainDescriptor,
    scanner: Scanner,
    store: Arc<dyn CheckpointStore>,
    guard: ReorgGuard,
    backoff: RetryPolicy,
    shutdown: CancellationToken,
    status: watch::Sender<MonitorStatus>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        descriptor: ChainDescriptor,
        scanner: Scanner,
        store: Arc<dyn CheckpointStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let guard = ReorgGuard::new(config.recheck_depth, config.recheck_interval, config.max_rewind);
        let backoff = RetryPolicy::new(RetryConfig {
            max_backoff: Duration::from_millis(config.retry.loop_max_backoff_ms),
            ..RetryConfig::from(&config.retry)
        });
        let (status, _) = watch::channel(MonitorStatus::new(config.network));
        Self {
            config,
            descriptor,
            scanner,
            store,
            guard,
            backoff,
            shutdown,
            status,
        }
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn descriptor(&self) -> &ChainDescriptor {
        &self.descriptor
    }

    /// Live status updates.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until shutdown. Only configuration errors end the loop early.
    pub async fn run(mut self) -> Result<MonitorStatus, IndexerError> {
        let network = self.config.network;
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let mut failures: u32 = 0;
        let mut rewinds: u32 = 0;

        info!(
            network = %network,
            contract = %self.descriptor.contract,
            confirmation_depth = self.descriptor.confirmation_depth,
            "monitor starting"
        );

        while !self.shutdown.is_cancelled() {
            match self.step().await {
                Ok(CycleOutcome::Progressed { .. }) => {
                    failures = 0;
                    rewinds = 0;
                }
                Ok(CycleOutcome::Rewound(event)) => {
                    failures = 0;
                    rewinds = rewinds.saturating_add(1);
                    let delay = self.backoff.backoff(rewinds);
                    debug!(
                        network = %network,
                        rewind_to = event.rewind_to,
                        consecutive = rewinds,
                        delay_ms = delay.as_millis() as u64,
                        "pausing before rescan"
                    );
                    if !self.sleep(delay).await {
                        break;
                    }
                }
                Ok(CycleOutcome::CaughtUp { .. }) => {
                    failures = 0;
                    rewinds = 0;
                    self.set_state(MonitorState::Idle);
                    if !self.sleep(poll).await {
                        break;
                    }
                }
                Ok(CycleOutcome::Stopped) => break,
                Err(e @ IndexerError::Configuration(_)) => {
                    error!(network = %network, error = %e, "monitor stopped by configuration error");
                    self.record_error(&e);
                    self.set_state(MonitorState::Stopped);
                    return Err(e);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.backoff.backoff(failures);
                    warn!(
                        network = %network,
                        error = %e,
                        kind = e.kind(),
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "cycle failed, backing off"
                    );
                    self.record_error(&e);
                    self.status.send_modify(|s| {
                        s.state = MonitorState::Backoff;
                        s.backoffs += 1;
                    });
                    if !self.sleep(delay).await {
                        break;
                    }
                }
            }
        }

        self.set_state(MonitorState::Stopped);
        info!(network = %network, "monitor stopped");
        Ok(self.status())
    }

    /// Run one cycle.
    pub async fn step(&mut self) -> Result<CycleOutcome, IndexerError> {
        if self.shutdown.is_cancelled() {
            return Ok(CycleOutcome::Stopped);
        }
        let cursor = self.current_cursor().await?;

        if self.guard.is_due() {
            if let Some(event) = self.check_reorgs(&cursor).await? {
                return Ok(CycleOutcome::Rewound(event));
            }
        }
        if self.shutdown.is_cancelled() {
            return Ok(CycleOutcome::Stopped);
        }

        self.set_state(MonitorState::Scanning);
        let head = self.scanner.head().await?;
        self.status.send_modify(|s| s.head = Some(head));

        let Some(range) = next_range(
            cursor.block_number,
            head,
            self.descriptor.confirmation_depth,
            self.config.max_chunk_blocks,
        ) else {
            debug!(network = %self.config.network, cursor = cursor.block_number, head, "caught up");
            return Ok(CycleOutcome::CaughtUp { head });
        };

        let fetched = self.scanner.fetch(range).await?;
        self.set_state(MonitorState::Decoding);
        let output = self.scanner.decode(fetched).await?;
        let (records, duplicates) = drop_conflicting_duplicates(self.config.network, output.records);

        self.set_state(MonitorState::Persisting);
        let next = cursor.advanced(range.to, output.tip_hash);
        let (outcome, conflicts) = match self.persist(&cursor, &next, records).await? {
            Persisted::Committed { outcome, dropped } => (outcome, dropped),
            Persisted::Rewound(event) => return Ok(CycleOutcome::Rewound(event)),
        };

        let skipped = output.skipped.len() + duplicates + conflicts;
        self.guard.tick();
        self.status.send_modify(|s| {
            s.state = MonitorState::Idle;
            s.cursor = Some(range.to);
            s.records_written += outcome.inserted as u64;
            s.logs_skipped += skipped as u64;
            s.updated_at = chrono::Utc::now();
        });
        info!(
            network = %self.config.network,
            from = range.from,
            to = range.to,
            inserted = outcome.inserted,
            unchanged = outcome.unchanged,
            skipped,
            "range committed"
        );
        Ok(CycleOutcome::Progressed {
            range,
            outcome,
            skipped,
        })
    }

    /// Compare stored anchors near the cursor with the canonical chain and
    /// roll back from the lowest mismatch. A rewind deeper than `max_rewind`,
    /// or one that would not move the cursor back, is only reported.
    pub async fn check_reorgs(&mut self, cursor: &Cursor) -> Result<Option<ReorgEvent>, IndexerError> {
        let Some(first_invalid) = self.detect_reorg(cursor).await? else {
            return Ok(None);
        };
        match self.guard.plan(cursor.block_number, first_invalid.block_number) {
            Ok(plan) => self
                .rewind(cursor.block_number, plan, ReorgKind::HashMismatch)
                .await
                .map(Some),
            Err(e @ (IndexerError::ReorgTooDeep { .. } | IndexerError::RewindAhead { .. })) => {
                self.record_error(&e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The lowest stored anchor (or the cursor itself) that is no longer
    /// canonical, if any. Does not modify anything but the re-check schedule.
    pub async fn detect_reorg(&mut self, cursor: &Cursor) -> Result<Option<L1Anchor>, IndexerError> {
        let Some(window) = self.guard.window(cursor.block_number) else {
            self.guard.mark_checked();
            return Ok(None);
        };

        let mut anchors = self
            .store
            .anchors_between(self.config.network, window.from, window.to)
            .await?;
        if let Some(hash) = cursor.block_hash {
            anchors.push(L1Anchor {
                block_number: cursor.block_number,
                block_hash: hash,
            });
        }
        anchors.sort();
        anchors.dedup();

        let checked = self.scanner.canonical_hashes(anchors).await?;
        self.guard.mark_checked();

        let mismatch = ReorgGuard::first_mismatch(&checked);
        match mismatch {
            Some(anchor) => warn!(
                network = %self.config.network,
                block = anchor.block_number,
                stored = %anchor.block_hash,
                "stored L1 anchor is no longer canonical"
            ),
            None => debug!(
                network = %self.config.network,
                %window,
                anchors = checked.len(),
                "reorg re-check clean"
            ),
        }
        Ok(mismatch)
    }

    /// The stored cursor, or the configured starting point if none is stored.
    pub async fn current_cursor(&self) -> Result<Cursor, IndexerError> {
        let family = self.descriptor.family;
        let network = self.config.network;
        let cursor = match self.store.load_cursor(family, network).await? {
            Some(c) => c,
            None => Cursor::new(family, network, self.config.initial_cursor_block(&self.descriptor)),
        };
        self.status.send_modify(|s| s.cursor = Some(cursor.block_number));
        Ok(cursor)
    }

    /// Write `records` and move the cursor to `next`.
    ///
    /// A conflict with a stored record whose L1 block is no longer canonical
    /// rolls the store back. If the stored record is still canonical it wins:
    /// the new one is dropped with an alarm and the batch is retried.
    async fn persist(
        &mut self,
        cursor: &Cursor,
        next: &Cursor,
        mut records: Vec<CheckpointRecord>,
    ) -> Result<Persisted, IndexerError> {
        let network = self.config.network;
        let mut dropped = 0;

        loop {
            let (l2_block_number, stored_l1_block, stored_root, observed_root) =
                match self.store.apply_batch(cursor.block_number, next, &records).await {
                    Ok(outcome) => return Ok(Persisted::Committed { outcome, dropped }),
                    Err(IndexerError::Conflict {
                        l2_block_number,
                        stored_l1_block,
                        stored_root,
                        observed_root,
                        ..
                    }) => (l2_block_number, stored_l1_block, stored_root, observed_root),
                    Err(e) => return Err(e),
                };

            self.set_state(MonitorState::ReorgRecovery);
            let stored = self.store.find_checkpoint(network, l2_block_number).await?;
            let canonical = self.scanner.block_hash(stored_l1_block).await?;
            let still_canonical = stored
                .as_ref()
                .filter(|r| r.l2_block_number == l2_block_number)
                .is_some_and(|r| Some(r.l1_block_hash) == canonical);

            if !still_canonical {
                match self.guard.plan(cursor.block_number, stored_l1_block) {
                    Ok(plan) => {
                        let event = self
                            .rewind(cursor.block_number, plan, ReorgKind::OutputConflict)
                            .await?;
                        return Ok(Persisted::Rewound(event));
                    }
                    Err(e @ (IndexerError::ReorgTooDeep { .. } | IndexerError::RewindAhead { .. })) => {
                        self.record_error(&e)
                    }
                    Err(e) => return Err(e),
                }
            }

            error!(
                network = %network,
                l2_block = l2_block_number,
                stored_l1_block,
                stored_root = %stored_root,
                observed_root = %observed_root,
                "conflicting output root for stored checkpoint, keeping stored"
            );
            records.retain(|r| r.l2_block_number != l2_block_number);
            dropped += 1;
            self.set_state(MonitorState::Persisting);
        }
    }

    async fn rewind(
        &mut self,
        cursor: u64,
        plan: RewindPlan,
        kind: ReorgKind,
    ) -> Result<ReorgEvent, IndexerError> {
        if plan.target >= cursor {
            return Err(IndexerError::RewindAhead {
                target: plan.target,
                cursor,
            });
        }
        self.set_state(MonitorState::ReorgRecovery);
        let network = self.config.network;
        let deleted = self
            .store
            .rewind(self.descriptor.family, network, plan.target)
            .await?;

        let event = ReorgEvent {
            network,
            first_invalid: plan.first_invalid,
            rewind_to: plan.target,
            depth: plan.depth,
            deleted,
            kind,
        };
        warn!(
            network = %network,
            %kind,
            first_invalid = plan.first_invalid,
            rewind_to = plan.target,
            depth = plan.depth,
            deleted,
            "rewound after reorg"
        );
        self.status.send_modify(|s| {
            s.state = MonitorState::Idle;
            s.cursor = Some(plan.target);
            s.reorgs += 1;
            s.updated_at = chrono::Utc::now();
        });
        Ok(event)
    }

    fn set_state(&self, state: MonitorState) {
        self.status.send_modify(|s| {
            s.state = state;
            s.updated_at = chrono::Utc::now();
        });
    }

    fn record_error(&self, e: &IndexerError) {
        let message = e.to_string();
        self.status.send_modify(|s| s.last_error = Some(message));
    }

    /// Sleep unless shutdown is requested first. Returns `false` on shutdown.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

/// Keep the first record seen for each L2 block. A later record for the same
/// block with the same root is left for the store to count as unchanged; one
/// with a different root is dropped with a warning.
fn drop_conflicting_duplicates(
    network: Network,
    records: Vec<CheckpointRecord>,
) -> (Vec<CheckpointRecord>, usize) {
    let mut first_roots: HashMap<u64, B256> = HashMap::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for record in records {
        match first_roots.get(&record.l2_block_number) {
            Some(root) if *root != record.output_root => {
                warn!(
                    network = %network,
                    l2_block = record.l2_block_number,
                    l1_block = record.l1_block_number,
                    log_index = record.log_index,
                    kept_root = %root,
                    dropped_root = %record.output_root,
                    "second output root for one L2 block in a batch, keeping the first"
                );
                dropped += 1;
            }
            Some(_) => kept.push(record),
            None => {
                first_roots.insert(record.l2_block_number, record.output_root);
                kept.push(record);
            }
        }
    }
    (kept, dropped)
}

/// Operator rewind: delete everything above `to_block` and move the cursor
/// there so the range is scanned again.
pub async fn backfill(
    store: &dyn CheckpointStore,
    descriptor: &ChainDescriptor,
    to_block: u64,
) -> Result<ReorgEvent, IndexerError> {
    let network = descriptor.network;
    let current = store
        .load_cursor(descriptor.family, network)
        .await?
        .map(|c| c.block_number);
    if let Some(current) = current {
        if to_block > current {
            return Err(IndexerError::Configuration(format!(
                "{network}: cursor is at {current}, cannot backfill from {to_block}"
            )));
        }
    }

    let deleted = store.rewind(descriptor.family, network, to_block).await?;
    let depth = current.map_or(0, |c| c - to_block);
    info!(network = %network, to_block, depth, deleted, "operator rewind applied");
    Ok(ReorgEvent {
        network,
        first_invalid: to_block.saturating_add(1),
        rewind_to: to_block,
        depth,
        deleted,
        kind: ReorgKind::Operator,
    })
}
