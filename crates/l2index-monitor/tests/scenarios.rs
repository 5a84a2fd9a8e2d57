//! End-to-end monitor scenarios against a scripted L1 chain and the memory store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chrono::Utc;
use l2index_core::{
    BlockRange, ChainFamily, ChainName, CheckpointRecord, CheckpointStore, Cursor, IndexerError,
    L1Network, MonitorState, Network, ReorgKind,
};
use l2index_monitor::{backfill, CycleOutcome, L1Rpc, Monitor, MonitorBuilder, Scanner, Supervisor};
use l2index_rpc::{
    EthClient, FailoverClient, JsonRpcRequest, JsonRpcResponse, RetryConfig, RetryPolicy, RpcLog,
    RpcTransport, TransportError,
};
use l2index_storage::MemoryStore;

fn contract() -> Address {
    Address::repeat_byte(0xaa)
}

fn word(n: u64) -> B256 {
    B256::from(U256::from(n).to_be_bytes::<32>())
}

fn network() -> Network {
    Network::new(ChainName::Optimism, L1Network::Sepolia)
}

// ─── Scripted L1 ─────────────────────────────────────────────────────────────

struct ChainState {
    head: u64,
    /// Blocks at or above this height belong to a fork with different hashes.
    fork_from: Option<u64>,
    logs: Vec<RpcLog>,
    failing_log_calls: usize,
}

struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                head,
                fork_from: None,
                logs: Vec::new(),
                failing_log_calls: 0,
            }),
        })
    }

    fn hash_at(state: &ChainState, n: u64) -> B256 {
        match state.fork_from {
            Some(f) if n >= f => {
                let mut h = word(n);
                h.0[0] = 0xf0;
                h
            }
            _ => word(n),
        }
    }

    /// Add an `OutputProposed` log at `l1_block`.
    fn propose(&self, l1_block: u64, log_index: u64, l2_block: u64, root: u8) {
        let mut state = self.state.lock().unwrap();
        let block_hash = Self::hash_at(&state, l1_block);
        state.logs.push(RpcLog {
            address: contract(),
            topics: vec![
                ChainFamily::OpStack.event_signature(),
                B256::repeat_byte(root),
                word(l2_block / 100),
                word(l2_block),
            ],
            data: Bytes::from(word(1_700_000_000 + l1_block).to_vec()),
            block_number: Some(l1_block),
            block_hash: Some(block_hash),
            tx_hash: Some(word(l1_block * 1_000 + log_index)),
            tx_index: Some(0),
            log_index: Some(log_index),
            removed: false,
        });
    }

    /// Replace every block from `from` upwards; logs in the old branch vanish.
    fn reorg(&self, from: u64) {
        let mut state = self.state.lock().unwrap();
        state.fork_from = Some(from);
        state.logs.retain(|l| l.block_number.is_some_and(|b| b < from));
    }

    fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    fn fail_next_log_calls(&self, n: usize) {
        self.state.lock().unwrap().failing_log_calls = n;
    }
}

#[async_trait]
impl L1Rpc for FakeChain {
    async fn head_block(&self) -> Result<u64, IndexerError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn logs(
        &self,
        address: Address,
        _topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RpcLog>, IndexerError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_log_calls > 0 {
            state.failing_log_calls -= 1;
            return Err(IndexerError::TransientUnavailable("all endpoints down".into()));
        }
        Ok(state
            .logs
            .iter()
            .filter(|l| l.address == address)
            .filter(|l| l.block_number.is_some_and(|b| range.contains(b)))
            .cloned()
            .collect())
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, IndexerError> {
        let state = self.state.lock().unwrap();
        if number > state.head {
            return Ok(None);
        }
        Ok(Some(Self::hash_at(&state, number)))
    }
}

fn builder(chain: &Arc<FakeChain>, store: &Arc<MemoryStore>, start_block: u64) -> MonitorBuilder {
    MonitorBuilder::new(network())
        .contract(contract())
        .start_block(start_block)
        .confirmation_depth(10)
        .poll_interval_ms(10)
        .l1(chain.clone())
        .store(store.clone())
}

async fn monitor(chain: &Arc<FakeChain>, store: &Arc<MemoryStore>, start_block: u64) -> Monitor {
    builder(chain, store, start_block).build().await.unwrap()
}

async fn cursor_block(store: &MemoryStore) -> Option<u64> {
    store
        .load_cursor(ChainFamily::OpStack, network())
        .await
        .unwrap()
        .map(|c| c.block_number)
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn scans_up_to_the_confirmation_depth() {
    let chain = FakeChain::new(1_000);
    chain.propose(960, 0, 12_000, 1);
    chain.propose(995, 0, 12_100, 2);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 951).await;

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, outcome, .. } => {
            assert_eq!(range, BlockRange::new(951, 990));
            assert_eq!(outcome.inserted, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(cursor_block(&store).await, Some(990));

    // block 995 is not yet 10 deep
    assert_eq!(monitor.step().await.unwrap(), CycleOutcome::CaughtUp { head: 1_000 });
    assert_eq!(store.count(network()).await.unwrap(), 1);

    chain.set_head(1_005);
    monitor.step().await.unwrap();
    assert_eq!(store.count(network()).await.unwrap(), 2);
    assert_eq!(cursor_block(&store).await, Some(995));
}

#[tokio::test]
async fn rescanning_a_range_is_idempotent() {
    let chain = FakeChain::new(1_000);
    for i in 0..5 {
        chain.propose(900 + i, 0, 10_000 + i * 100, 1);
    }
    let store = Arc::new(MemoryStore::new());
    let descriptor = monitor(&chain, &store, 850).await.descriptor().clone();
    let scanner = Scanner::new(descriptor.clone(), chain.clone(), None, 1_000, 4);
    let range = BlockRange::new(850, 990);
    let cursor = Cursor::new(descriptor.family, descriptor.network, range.to);

    let first = scanner.scan(range).await.unwrap();
    let outcome = store.apply_batch(0, &cursor, &first.records).await.unwrap();
    assert_eq!(outcome.inserted, 5);

    let second = scanner.scan(range).await.unwrap();
    let outcome = store.apply_batch(range.to, &cursor, &second.records).await.unwrap();
    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.unchanged, 5);
    assert_eq!(store.count(network()).await.unwrap(), 5);
}

#[tokio::test]
async fn one_l2_block_is_stored_once() {
    let chain = FakeChain::new(1_000);
    // the same output proposed twice on L1
    chain.propose(901, 0, 5_000, 7);
    chain.propose(950, 3, 5_000, 7);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 850).await;

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { outcome, .. } => {
            assert_eq!(outcome.inserted, 1);
            assert_eq!(outcome.unchanged, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let stored = store.records(network());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].l1_block_number, 901);
}

#[tokio::test]
async fn second_root_for_one_l2_block_in_a_range_is_skipped() {
    let chain = FakeChain::new(1_000);
    chain.propose(955, 0, 4_100, 1);
    chain.propose(960, 0, 4_200, 2);
    chain.propose(970, 0, 4_200, 3);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 951).await;

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, outcome, skipped } => {
            assert_eq!(range, BlockRange::new(951, 990));
            assert_eq!(outcome.inserted, 2);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(cursor_block(&store).await, Some(990));
    let stored = store.records(network());
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].l2_block_number, 4_100);
    assert_eq!(stored[1].l1_block_number, 960);
    assert_eq!(stored[1].output_root, B256::repeat_byte(2));

    assert_eq!(monitor.step().await.unwrap(), CycleOutcome::CaughtUp { head: 1_000 });
    assert_eq!(monitor.status().reorgs, 0);
}

#[tokio::test]
async fn conflict_above_the_cursor_never_moves_it_forward() {
    let chain = FakeChain::new(1_000);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = builder(&chain, &store, 850).recheck(0, 10).build().await.unwrap();
    monitor.step().await.unwrap();
    assert_eq!(cursor_block(&store).await, Some(990));

    // a stray row above the cursor, anchored on a block the chain does not have
    let stray = CheckpointRecord {
        family: ChainFamily::OpStack,
        network: network(),
        l2_block_number: 7_000,
        l2_output_index: Some(70),
        l2_block_hash: None,
        output_root: B256::repeat_byte(1),
        l1_block_number: 995,
        l1_block_hash: B256::repeat_byte(0xdd),
        l1_tx_hash: B256::repeat_byte(0xee),
        l1_tx_index: 0,
        log_index: 0,
        l1_timestamp: None,
        observed_at: Utc::now(),
    };
    let at_990 = Cursor::new(ChainFamily::OpStack, network(), 990);
    store.apply_batch(990, &at_990, &[stray]).await.unwrap();

    chain.propose(995, 0, 7_000, 2);
    chain.propose(997, 0, 7_100, 3);
    chain.set_head(1_010);

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, outcome, skipped } => {
            assert_eq!(range, BlockRange::new(991, 1_000));
            assert_eq!(outcome.inserted, 1);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(cursor_block(&store).await, Some(1_000));
    assert_eq!(monitor.status().reorgs, 0);
    assert!(monitor
        .status()
        .last_error
        .is_some_and(|e| e.contains("not below the cursor")));
}

#[tokio::test]
async fn failed_batch_leaves_cursor_behind_data() {
    let chain = FakeChain::new(1_000);
    for i in 0..5 {
        chain.propose(900 + i, 0, 10_000 + i * 100, 1);
    }
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 850).await;

    store.fail_next_apply_after(2);
    let err = monitor.step().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.count(network()).await.unwrap(), 0);
    assert_eq!(cursor_block(&store).await, None);

    // the same range is retried and lands whole
    monitor.step().await.unwrap();
    assert_eq!(store.count(network()).await.unwrap(), 5);
    assert_eq!(cursor_block(&store).await, Some(990));
}

#[tokio::test]
async fn one_bad_log_in_fifty_is_skipped() {
    let chain = FakeChain::new(1_000);
    for i in 0..50 {
        chain.propose(900 + i, 0, 10_000 + i * 100, 1);
    }
    {
        let mut state = chain.state.lock().unwrap();
        state.logs[17].data = Bytes::from(vec![0u8; 31]);
    }
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 850).await;

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, outcome, skipped } => {
            assert_eq!(range.to, 990);
            assert_eq!(outcome.inserted, 49);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(store.count(network()).await.unwrap(), 49);
    assert_eq!(cursor_block(&store).await, Some(990));
    let status = monitor.status();
    assert_eq!(status.records_written, 49);
    assert_eq!(status.logs_skipped, 1);
}

#[tokio::test]
async fn transient_rpc_failure_retries_the_same_range() {
    let chain = FakeChain::new(1_000);
    chain.propose(920, 0, 9_000, 1);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 850).await;

    chain.fail_next_log_calls(1);
    assert!(monitor.step().await.unwrap_err().is_transient());
    assert_eq!(cursor_block(&store).await, None);

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, .. } => assert_eq!(range, BlockRange::new(850, 990)),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn reorg_is_detected_by_recheck_and_rescanned() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 0xa1);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = builder(&chain, &store, 850)
        .recheck(128, 1)
        .build()
        .await
        .unwrap();

    monitor.step().await.unwrap();
    assert_eq!(store.count(network()).await.unwrap(), 1);

    // block 900 is replaced; the output is re-proposed with a new root
    chain.reorg(900);
    chain.propose(900, 0, 5_000, 0xb2);

    match monitor.step().await.unwrap() {
        CycleOutcome::Rewound(event) => {
            assert_eq!(event.kind, ReorgKind::HashMismatch);
            assert_eq!(event.first_invalid, 900);
            assert_eq!(event.rewind_to, 899);
            assert_eq!(event.deleted, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(store.count(network()).await.unwrap(), 0);
    assert_eq!(cursor_block(&store).await, Some(899));

    monitor.step().await.unwrap();
    let restored = store.find_checkpoint(network(), 5_000).await.unwrap().unwrap();
    assert_eq!(restored.output_root, B256::repeat_byte(0xb2));
    assert_eq!(cursor_block(&store).await, Some(990));
    assert_eq!(monitor.status().reorgs, 1);
}

#[tokio::test]
async fn conflict_on_orphaned_block_rewinds() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 0xa1);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = builder(&chain, &store, 850).recheck(0, 10).build().await.unwrap();
    monitor.step().await.unwrap();

    // the proposal moved to a later block with a different root
    chain.reorg(900);
    chain.propose(995, 0, 5_000, 0xb2);
    chain.set_head(1_010);

    match monitor.step().await.unwrap() {
        CycleOutcome::Rewound(event) => {
            assert_eq!(event.kind, ReorgKind::OutputConflict);
            assert_eq!(event.rewind_to, 899);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(cursor_block(&store).await, Some(899));

    monitor.step().await.unwrap();
    let stored = store.records(network());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].l1_block_number, 995);
    assert_eq!(stored[0].output_root, B256::repeat_byte(0xb2));
}

#[tokio::test]
async fn conflict_with_canonical_record_keeps_stored() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 0xa1);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = builder(&chain, &store, 850).recheck(0, 10).build().await.unwrap();
    monitor.step().await.unwrap();

    chain.propose(995, 0, 5_000, 0xb2);
    chain.propose(996, 0, 5_100, 0xb3);
    chain.set_head(1_010);

    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { outcome, skipped, .. } => {
            assert_eq!(outcome.inserted, 1);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let kept = store.find_checkpoint(network(), 5_000).await.unwrap().unwrap();
    assert_eq!(kept.output_root, B256::repeat_byte(0xa1));
    assert_eq!(cursor_block(&store).await, Some(1_000));
}

#[tokio::test]
async fn reorg_deeper_than_max_rewind_is_not_applied() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 0xa1);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = builder(&chain, &store, 850)
        .recheck(128, 1)
        .max_rewind(16)
        .build()
        .await
        .unwrap();
    monitor.step().await.unwrap();

    chain.reorg(900);
    chain.set_head(1_010);
    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, .. } => assert_eq!(range, BlockRange::new(991, 1_000)),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(store.count(network()).await.unwrap(), 1);
    assert!(monitor.status().last_error.is_some());
}

#[tokio::test]
async fn operator_backfill_rewinds_and_rescans() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 1);
    chain.propose(950, 0, 5_100, 2);
    let store = Arc::new(MemoryStore::new());
    let mut monitor = monitor(&chain, &store, 850).await;
    monitor.step().await.unwrap();

    let descriptor = monitor.descriptor().clone();
    let event = backfill(store.as_ref(), &descriptor, 920).await.unwrap();
    assert_eq!(event.kind, ReorgKind::Operator);
    assert_eq!(event.deleted, 1);
    assert_eq!(event.depth, 70);
    assert!(backfill(store.as_ref(), &descriptor, 995).await.is_err());

    monitor.step().await.unwrap();
    assert_eq!(store.count(network()).await.unwrap(), 2);
}

/// Rewinds the store the first time logs are fetched after being armed.
struct RewindDuringFetch {
    chain: Arc<FakeChain>,
    store: Arc<MemoryStore>,
    rewind_to: Mutex<Option<u64>>,
}

#[async_trait]
impl L1Rpc for RewindDuringFetch {
    async fn head_block(&self) -> Result<u64, IndexerError> {
        self.chain.head_block().await
    }

    async fn logs(
        &self,
        address: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RpcLog>, IndexerError> {
        let armed = self.rewind_to.lock().unwrap().take();
        if let Some(to_block) = armed {
            self.store.rewind(ChainFamily::OpStack, network(), to_block).await?;
        }
        self.chain.logs(address, topic0, range).await
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, IndexerError> {
        self.chain.block_hash(number).await
    }
}

#[tokio::test]
async fn operator_rewind_during_a_cycle_is_not_overwritten() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 1);
    chain.propose(950, 0, 5_100, 2);
    let store = Arc::new(MemoryStore::new());
    let l1 = Arc::new(RewindDuringFetch {
        chain: chain.clone(),
        store: store.clone(),
        rewind_to: Mutex::new(None),
    });
    let mut monitor = builder(&chain, &store, 850).l1(l1.clone()).build().await.unwrap();
    monitor.step().await.unwrap();
    assert_eq!(cursor_block(&store).await, Some(990));

    chain.propose(995, 0, 5_200, 3);
    chain.set_head(1_010);
    *l1.rewind_to.lock().unwrap() = Some(920);

    let err = monitor.step().await.unwrap_err();
    assert!(matches!(
        err,
        IndexerError::CursorMoved { expected: 990, found: 920, .. }
    ));
    assert!(err.is_transient());
    assert_eq!(cursor_block(&store).await, Some(920));
    assert_eq!(store.count(network()).await.unwrap(), 1);

    // the next cycle starts from the rewound cursor and fills the gap
    match monitor.step().await.unwrap() {
        CycleOutcome::Progressed { range, outcome, .. } => {
            assert_eq!(range, BlockRange::new(921, 1_000));
            assert_eq!(outcome.inserted, 2);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(store.count(network()).await.unwrap(), 3);
    assert_eq!(cursor_block(&store).await, Some(1_000));
}

#[tokio::test]
async fn run_loop_stops_on_shutdown() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 1);
    let store = Arc::new(MemoryStore::new());
    let mut supervisor = Supervisor::new(CancellationToken::new());
    let monitor = builder(&chain, &store, 850)
        .shutdown(supervisor.token())
        .build()
        .await
        .unwrap();
    let mut status = monitor.subscribe();
    supervisor.spawn(monitor);

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = status.borrow().clone();
            if current.cursor == Some(990) && current.state == MonitorState::Idle {
                break;
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    supervisor.shutdown();
    let results = supervisor.join().await;
    assert_eq!(results.len(), 1);
    let final_status = results[0].1.as_ref().unwrap();
    assert_eq!(final_status.state, MonitorState::Stopped);
    assert_eq!(final_status.records_written, 1);
}

#[tokio::test]
async fn storage_outage_backs_off_and_recovers() {
    let chain = FakeChain::new(1_000);
    chain.propose(900, 0, 5_000, 1);
    let store = Arc::new(MemoryStore::new());
    store.set_unavailable(true);
    let token = CancellationToken::new();
    let monitor = builder(&chain, &store, 850)
        .retry(l2index_core::RetrySettings {
            initial_backoff_ms: 5,
            max_backoff_ms: 10,
            loop_max_backoff_ms: 10,
            ..Default::default()
        })
        .shutdown(token.clone())
        .build()
        .await
        .unwrap();
    let mut status = monitor.subscribe();
    let handle = tokio::spawn(monitor.run());

    tokio::time::timeout(Duration::from_secs(5), async {
        while status.borrow().backoffs < 2 {
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    store.set_unavailable(false);

    tokio::time::timeout(Duration::from_secs(5), async {
        while status.borrow().records_written < 1 {
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    token.cancel();
    let final_status = handle.await.unwrap().unwrap();
    assert!(final_status.backoffs >= 2);
    assert_eq!(cursor_block(&store).await, Some(990));
}

// ─── Failover through the real client stack ─────────────────────────────────

struct ScriptedEndpoint {
    url: String,
    script: Mutex<VecDeque<Result<JsonRpcResponse, TransportError>>>,
    calls: AtomicUsize,
}

impl ScriptedEndpoint {
    fn new(url: &str, script: Vec<Result<JsonRpcResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl RpcTransport for ScriptedEndpoint {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(JsonRpcResponse::success(req.id, serde_json::json!("0x3e8"))))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[tokio::test]
async fn rate_limited_endpoint_fails_over() {
    let limited = || {
        Err(TransportError::RateLimited {
            provider: "one".into(),
        })
    };
    let one = ScriptedEndpoint::new(
        "https://one",
        vec![
            limited(),
            limited(),
            limited(),
            Err(TransportError::Connection("connection reset by peer".into())),
        ],
    );
    let two = ScriptedEndpoint::new("https://two", vec![]);
    let endpoints = vec![
        one.clone() as Arc<dyn RpcTransport>,
        two.clone() as Arc<dyn RpcTransport>,
    ];
    let failover = FailoverClient::new(
        endpoints,
        RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        }),
    );
    let client = EthClient::new(Arc::new(failover), 1_000);

    assert_eq!(client.head_block().await.unwrap(), 1_000);
    assert_eq!(one.calls.load(Ordering::SeqCst), 4);
    assert_eq!(two.calls.load(Ordering::SeqCst), 1);

    // the healthy endpoint is remembered
    assert_eq!(client.head_block().await.unwrap(), 1_000);
    assert_eq!(one.calls.load(Ordering::SeqCst), 4);
    assert_eq!(two.calls.load(Ordering::SeqCst), 2);
}
