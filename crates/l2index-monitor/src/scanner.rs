//! Event scanner: picks confirmation-safe ranges, fetches and decodes logs.
//!
//! A range is split into sub-ranges no wider than the provider's log range
//! limit. Sub-ranges are fetched concurrently but reassembled in order, so the
//! records of a batch always come out sorted by `(l1_block, log_index)`.

use std::sync::Arc;

use alloy_primitives::B256;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, warn};

use l2index_core::{
    decode, BlockRange, ChainDescriptor, CheckpointRecord, DecodeError, IndexerError, L1Anchor,
    L2Anchor, RawLogEvent,
};
use l2index_rpc::RpcLog;

use crate::fetcher::{raw_log, L1Rpc, L2Rpc};

/// The next range to scan, or `None` when the cursor has reached the safe head.
///
/// `safe = head − confirmation_depth`; the range starts right after the
/// cursor and is at most `max_chunk_blocks` long.
pub fn next_range(
    cursor: u64,
    head: u64,
    confirmation_depth: u64,
    max_chunk_blocks: u64,
) -> Option<BlockRange> {
    let safe = head.saturating_sub(confirmation_depth);
    if safe <= cursor || max_chunk_blocks == 0 {
        return None;
    }
    let from = cursor + 1;
    let to = safe.min(cursor.saturating_add(max_chunk_blocks));
    Some(BlockRange::new(from, to))
}

/// A log that was fetched but produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLog {
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub error: DecodeError,
}

/// Logs fetched for one range, in `(block, log_index)` order.
#[derive(Debug, Clone)]
pub struct FetchedLogs {
    pub range: BlockRange,
    pub logs: Vec<RawLogEvent>,
    pub skipped: Vec<SkippedLog>,
}

/// Result of scanning one range.
#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub range: BlockRange,
    pub records: Vec<CheckpointRecord>,
    pub skipped: Vec<SkippedLog>,
    /// Hash of `range.to`, stored on the cursor.
    pub tip_hash: Option<B256>,
}

pub struct Scanner {
    descriptor: ChainDescriptor,
    l1: Arc<dyn L1Rpc>,
    l2: Option<Arc<dyn L2Rpc>>,
    max_log_range: u64,
    concurrency: usize,
}

impl Scanner {
    pub fn new(
        descriptor: ChainDescriptor,
        l1: Arc<dyn L1Rpc>,
        l2: Option<Arc<dyn L2Rpc>>,
        max_log_range: u64,
        concurrency: usize,
    ) -> Self {
        Self {
            descriptor,
            l1,
            l2,
            max_log_range: max_log_range.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn descriptor(&self) -> &ChainDescriptor {
        &self.descriptor
    }

    pub async fn head(&self) -> Result<u64, IndexerError> {
        self.l1.head_block().await
    }

    pub async fn block_hash(&self, number: u64) -> Result<Option<B256>, IndexerError> {
        self.l1.block_hash(number).await
    }

    /// Fetch, decode and resolve every checkpoint in `range`.
    pub async fn scan(&self, range: BlockRange) -> Result<ScanOutput, IndexerError> {
        let fetched = self.fetch(range).await?;
        self.decode(fetched).await
    }

    /// Fetch the logs of `range`. Logs flagged `removed` are dropped; logs
    /// missing their position are reported as skipped.
    pub async fn fetch(&self, range: BlockRange) -> Result<FetchedLogs, IndexerError> {
        let address = self.descriptor.contract;
        let topic0 = self.descriptor.event_signature;
        let chunks = range.chunks(self.max_log_range);

        let batches: Vec<Vec<RpcLog>> = futures::stream::iter(chunks)
            .map(|chunk| {
                debug!(network = %self.descriptor.network, %chunk, "fetching logs");
                self.l1.logs(address, topic0, chunk)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut logs = Vec::new();
        let mut skipped = Vec::new();
        for log in batches.into_iter().flatten().filter(|l| !l.removed) {
            match raw_log(&log) {
                Ok(raw) => logs.push(raw),
                Err(error) => {
                    warn!(
                        network = %self.descriptor.network,
                        block = ?log.block_number,
                        log_index = ?log.log_index,
                        tx = ?log.tx_hash,
                        error = %error,
                        "skipping log without position"
                    );
                    skipped.push(SkippedLog {
                        block_number: log.block_number,
                        log_index: log.log_index,
                        error,
                    });
                }
            }
        }
        logs.sort_by_key(RawLogEvent::position);
        logs.dedup_by_key(|l| l.position());

        Ok(FetchedLogs {
            range,
            logs,
            skipped,
        })
    }

    /// Decode fetched logs into records and look up the range tip hash.
    ///
    /// A log that fails to decode is skipped with a warning. An Arbitrum
    /// block hash the L2 node does not know is skipped the same way; an L2
    /// transport failure fails the whole range.
    pub async fn decode(&self, fetched: FetchedLogs) -> Result<ScanOutput, IndexerError> {
        let FetchedLogs {
            range,
            logs,
            mut skipped,
        } = fetched;
        let network = self.descriptor.network;
        let observed_at = Utc::now();
        let mut records = Vec::with_capacity(logs.len());

        for log in &logs {
            let decoded = match decode(log, &self.descriptor) {
                Ok(d) => d,
                Err(error) => {
                    warn!(
                        network = %network,
                        block = log.block_number,
                        log_index = log.log_index,
                        tx = %log.tx_hash,
                        error = %error,
                        "skipping undecodable log"
                    );
                    skipped.push(SkippedLog {
                        block_number: Some(log.block_number),
                        log_index: Some(log.log_index),
                        error,
                    });
                    continue;
                }
            };

            let l2_block_number = match decoded.anchor {
                L2Anchor::BlockNumber(n) => n,
                L2Anchor::BlockHash(hash) => match self.resolve_l2_block(hash).await? {
                    Some(n) => n,
                    None => {
                        warn!(
                            network = %network,
                            block = log.block_number,
                            l2_block_hash = %hash,
                            "L2 node does not know block hash, skipping"
                        );
                        skipped.push(SkippedLog {
                            block_number: Some(log.block_number),
                            log_index: Some(log.log_index),
                            error: DecodeError::UnknownL2Block { hash },
                        });
                        continue;
                    }
                },
            };
            records.push(decoded.into_record(l2_block_number, observed_at));
        }

        let tip_hash = self.l1.block_hash(range.to).await?;

        debug!(
            network = %network,
            %range,
            records = records.len(),
            skipped = skipped.len(),
            "range decoded"
        );
        Ok(ScanOutput {
            range,
            records,
            skipped,
            tip_hash,
        })
    }

    /// Pair each stored anchor with the hash the chain has at that height now.
    pub async fn canonical_hashes(
        &self,
        anchors: Vec<L1Anchor>,
    ) -> Result<Vec<(L1Anchor, Option<B256>)>, IndexerError> {
        futures::stream::iter(anchors)
            .map(|anchor| async move {
                let canonical = self.l1.block_hash(anchor.block_number).await?;
                Ok::<_, IndexerError>((anchor, canonical))
            })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn resolve_l2_block(&self, hash: B256) -> Result<Option<u64>, IndexerError> {
        let l2 = self.l2.as_ref().ok_or_else(|| {
            IndexerError::Configuration(format!(
                "{}: arbitrum networks need an L2 RPC URL",
                self.descriptor.network
            ))
        })?;
        l2.block_number_by_hash(hash).await
    }
}
