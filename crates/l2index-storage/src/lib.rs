//! l2index-storage: checkpoint and cursor stores for l2index.
//!
//! Backends:
//! - [`memory`]: in-memory (tests, fault injection, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (single file, one host)
//! - [`postgres`]: PostgreSQL via `sqlx` (shared by many monitors)
//!
//! All backends create `l2_checkpoints` (PK `network, l2_block_number`) and
//! `l2_cursors` (PK `family, network`) on connect.

use std::sync::Arc;

use l2index_core::{CheckpointStore, IndexerError};

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod codec;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresOptions, PostgresStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Open a store, choosing the backend from the URL scheme.
///
/// - `postgres://…` / `postgresql://…` → [`PostgresStore`]
/// - `sqlite:…` or a plain file path ending in `.db` → [`SqliteStore`]
/// - `memory://` → [`MemoryStore`]
pub async fn connect(url: &str) -> Result<Arc<dyn CheckpointStore>, IndexerError> {
    if url.starts_with("memory:") {
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "postgres")]
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PostgresStore::connect(url).await?));
    }

    #[cfg(feature = "sqlite")]
    if url.starts_with("sqlite:") || url.ends_with(".db") {
        return Ok(Arc::new(SqliteStore::open(url).await?));
    }

    Err(IndexerError::Configuration(format!(
        "unsupported store URL '{}'",
        redact(url)
    )))
}

/// Strip credentials from a connection URL before it is logged.
pub fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod conformance {
    //! Behaviour every backend must share, run against each of them.

    use alloy_primitives::B256;
    use chrono::Utc;
    use l2index_core::{
        ApplyOutcome, ChainFamily, ChainName, CheckpointRecord, CheckpointStore, Cursor,
        IndexerError, L1Network, Network,
    };

    pub fn network() -> Network {
        Network::new(ChainName::Optimism, L1Network::Sepolia)
    }

    pub fn record(network: Network, l2_block: u64, l1_block: u64, root: u8) -> CheckpointRecord {
        CheckpointRecord {
            family: network.family(),
            network,
            l2_block_number: l2_block,
            l2_output_index: Some(l2_block / 100),
            l2_block_hash: None,
            output_root: B256::repeat_byte(root),
            l1_block_number: l1_block,
            l1_block_hash: B256::from(alloy_primitives::U256::from(l1_block).to_be_bytes::<32>()),
            l1_tx_hash: B256::repeat_byte(0x77),
            l1_tx_index: 1,
            log_index: 2,
            l1_timestamp: Some(1_700_000_000 + l1_block),
            observed_at: Utc::now(),
        }
    }

    fn cursor_at(network: Network, block: u64) -> Cursor {
        Cursor::new(network.family(), network, block).advanced(block, Some(B256::repeat_byte(0xcc)))
    }

    pub async fn apply_and_query(store: &dyn CheckpointStore) {
        let net = network();
        let batch = vec![record(net, 100, 900, 1), record(net, 200, 905, 2)];

        let outcome = store.apply_batch(0, &cursor_at(net, 910), &batch).await.unwrap();
        assert_eq!(outcome, ApplyOutcome { inserted: 2, unchanged: 0 });

        let cursor = store.load_cursor(ChainFamily::OpStack, net).await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 910);
        assert_eq!(cursor.block_hash, Some(B256::repeat_byte(0xcc)));

        assert_eq!(store.count(net).await.unwrap(), 2);
        let found = store.find_checkpoint(net, 150).await.unwrap().unwrap();
        assert_eq!(found.l2_block_number, 200);
        assert_eq!(found.l1_timestamp, Some(1_700_000_905));
        assert_eq!(found.l2_output_index, Some(2));
        assert!(store.find_checkpoint(net, 201).await.unwrap().is_none());

        let latest = store.latest_checkpoint(net).await.unwrap().unwrap();
        assert_eq!(latest.l2_block_number, 200);
        assert_eq!(latest.output_root, B256::repeat_byte(2));

        let anchors = store.anchors_between(net, 0, 904).await.unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].block_number, 900);

        let cursors = store.list_cursors().await.unwrap();
        assert_eq!(cursors.len(), 1);
    }

    pub async fn reapply_is_idempotent(store: &dyn CheckpointStore) {
        let net = network();
        let batch = vec![record(net, 100, 900, 1), record(net, 200, 905, 2)];
        store.apply_batch(0, &cursor_at(net, 910), &batch).await.unwrap();

        for _ in 0..3 {
            let outcome = store.apply_batch(910, &cursor_at(net, 910), &batch).await.unwrap();
            assert_eq!(outcome, ApplyOutcome { inserted: 0, unchanged: 2 });
        }
        assert_eq!(store.count(net).await.unwrap(), 2);
    }

    pub async fn stale_cursor_is_rejected(store: &dyn CheckpointStore) {
        let net = network();
        store.apply_batch(0, &cursor_at(net, 1_000), &[]).await.unwrap();

        let err = store
            .apply_batch(400, &cursor_at(net, 500), &[record(net, 100, 450, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::CursorMoved { expected: 400, found: 1_000, .. }
        ));
        assert!(err.is_transient());
        assert_eq!(store.count(net).await.unwrap(), 0);
        let cursor = store.load_cursor(ChainFamily::OpStack, net).await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 1_000);
    }

    pub async fn rewind_during_batch_is_not_overwritten(store: &dyn CheckpointStore) {
        let net = network();
        let batch = vec![record(net, 100, 900, 1), record(net, 200, 905, 2)];
        store.apply_batch(0, &cursor_at(net, 910), &batch).await.unwrap();

        // a monitor scanned 911..=960 from cursor 910; an operator rewinds meanwhile
        store.rewind(ChainFamily::OpStack, net, 902).await.unwrap();
        let err = store
            .apply_batch(910, &cursor_at(net, 960), &[record(net, 300, 950, 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::CursorMoved { expected: 910, found: 902, .. }
        ));

        let cursor = store.load_cursor(ChainFamily::OpStack, net).await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 902);
        assert_eq!(store.count(net).await.unwrap(), 1);
        assert!(store.find_checkpoint(net, 250).await.unwrap().is_none());
    }

    pub async fn conflict_rolls_back_batch(store: &dyn CheckpointStore) {
        let net = network();
        store
            .apply_batch(0, &cursor_at(net, 910), &[record(net, 100, 900, 1)])
            .await
            .unwrap();

        let batch = vec![record(net, 300, 950, 3), record(net, 100, 940, 9)];
        let err = store.apply_batch(910, &cursor_at(net, 960), &batch).await.unwrap_err();
        match err {
            IndexerError::Conflict {
                l2_block_number,
                stored_l1_block,
                stored_root,
                observed_root,
                ..
            } => {
                assert_eq!(l2_block_number, 100);
                assert_eq!(stored_l1_block, 900);
                assert_eq!(stored_root, B256::repeat_byte(1));
                assert_eq!(observed_root, B256::repeat_byte(9));
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        // nothing from the failed batch is visible
        assert_eq!(store.count(net).await.unwrap(), 1);
        assert!(store.find_checkpoint(net, 300).await.unwrap().is_none());
        let cursor = store.load_cursor(ChainFamily::OpStack, net).await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 910);
    }

    pub async fn rewind_deletes_above_target(store: &dyn CheckpointStore) {
        let net = network();
        let batch = vec![
            record(net, 100, 890, 1),
            record(net, 200, 900, 2),
            record(net, 300, 920, 3),
        ];
        store.apply_batch(0, &cursor_at(net, 950), &batch).await.unwrap();

        let deleted = store.rewind(ChainFamily::OpStack, net, 899).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count(net).await.unwrap(), 1);

        let cursor = store.load_cursor(ChainFamily::OpStack, net).await.unwrap().unwrap();
        assert_eq!(cursor.block_number, 899);
        assert_eq!(cursor.block_hash, None);

        // forward progress resumes from the rewound cursor
        store
            .apply_batch(899, &cursor_at(net, 930), &[record(net, 200, 901, 4)])
            .await
            .unwrap();
        let restored = store.find_checkpoint(net, 200).await.unwrap().unwrap();
        assert_eq!(restored.output_root, B256::repeat_byte(4));
    }

    pub async fn networks_are_partitioned(store: &dyn CheckpointStore) {
        let op = network();
        let base = Network::new(ChainName::Base, L1Network::Sepolia);
        store
            .apply_batch(0, &cursor_at(op, 910), &[record(op, 100, 900, 1)])
            .await
            .unwrap();
        let outcome = store
            .apply_batch(0, &cursor_at(base, 910), &[record(base, 100, 900, 2)])
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(store.count(op).await.unwrap(), 1);
        assert_eq!(store.count(base).await.unwrap(), 1);

        store.rewind(ChainFamily::OpStack, base, 0).await.unwrap();
        assert_eq!(store.count(op).await.unwrap(), 1);
        assert_eq!(store.count(base).await.unwrap(), 0);
    }

    pub async fn arbitrum_fields_round_trip(store: &dyn CheckpointStore) {
        let net = Network::new(ChainName::Arbitrum, L1Network::Mainnet);
        let mut rec = record(net, 123_456, 900, 5);
        rec.l2_output_index = None;
        rec.l1_timestamp = None;
        rec.l2_block_hash = Some(B256::repeat_byte(0xab));

        store.apply_batch(0, &cursor_at(net, 900), &[rec]).await.unwrap();
        let loaded = store.latest_checkpoint(net).await.unwrap().unwrap();
        assert_eq!(loaded.family, ChainFamily::Arbitrum);
        assert_eq!(loaded.l2_block_hash, Some(B256::repeat_byte(0xab)));
        assert_eq!(loaded.l2_output_index, None);
        assert_eq!(loaded.l1_timestamp, None);
    }

    /// Runs every check against fresh stores produced by `make`.
    macro_rules! store_conformance {
        ($make:expr $(, #[$meta:meta])* $(,)?) => {
            #[tokio::test]
            $(#[$meta])*
            async fn apply_and_query() {
                $crate::conformance::apply_and_query(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn reapply_is_idempotent() {
                $crate::conformance::reapply_is_idempotent(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn stale_cursor_is_rejected() {
                $crate::conformance::stale_cursor_is_rejected(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn rewind_during_batch_is_not_overwritten() {
                $crate::conformance::rewind_during_batch_is_not_overwritten(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn conflict_rolls_back_batch() {
                $crate::conformance::conflict_rolls_back_batch(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn rewind_deletes_above_target() {
                $crate::conformance::rewind_deletes_above_target(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn networks_are_partitioned() {
                $crate::conformance::networks_are_partitioned(&$make.await).await;
            }
            #[tokio::test]
            $(#[$meta])*
            async fn arbitrum_fields_round_trip() {
                $crate::conformance::arbitrum_fields_round_trip(&$make.await).await;
            }
        };
    }

    pub(crate) use store_conformance;
}
