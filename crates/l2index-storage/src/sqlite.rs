//! SQLite storage backend.
//!
//! Persists checkpoints and cursors to a single SQLite file with WAL mode.
//! Suitable for one host running several monitors; use Postgres when the
//! store is shared across machines.
//!
//! # Usage
//! ```rust,no_run
//! use l2index_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./l2index.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use l2index_core::{
    ApplyOutcome, ChainFamily, CheckpointRecord, CheckpointStore, Cursor, IndexerError, L1Anchor,
    Network,
};

use crate::codec::{
    hash_text, opt_to_i64, opt_to_u64, parse_family, parse_hash, parse_network, parse_opt_hash,
    storage_err, to_i64, to_u64,
};

const RECORD_COLUMNS: &str = "family, network, l2_block_number, l2_output_index, l2_block_hash, \
     output_root, l1_block_number, l1_block_hash, l1_tx_hash, l1_tx_index, log_index, \
     l1_timestamp, observed_at";

/// SQLite-backed checkpoint store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./l2index.db"`) or a full
    /// SQLite URL (`"sqlite:./l2index.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        // Each connection to `sqlite::memory:` is its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .map_err(storage_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. All data is lost when dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        Self::open("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS l2_checkpoints (
                family          TEXT    NOT NULL,
                network         TEXT    NOT NULL,
                l2_block_number INTEGER NOT NULL,
                l2_output_index INTEGER,
                l2_block_hash   TEXT,
                output_root     TEXT    NOT NULL,
                l1_block_number INTEGER NOT NULL,
                l1_block_hash   TEXT    NOT NULL,
                l1_tx_hash      TEXT    NOT NULL,
                l1_tx_index     INTEGER NOT NULL,
                log_index       INTEGER NOT NULL,
                l1_timestamp    INTEGER,
                observed_at     TEXT    NOT NULL,
                PRIMARY KEY (network, l2_block_number)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_l2_checkpoints_l1 ON l2_checkpoints (network, l1_block_number);",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS l2_cursors (
                family       TEXT    NOT NULL,
                network      TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                block_hash   TEXT,
                updated_at   TEXT    NOT NULL,
                PRIMARY KEY (family, network)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<CheckpointRecord, IndexerError> {
    Ok(CheckpointRecord {
        family: parse_family(&row.try_get::<String, _>("family").map_err(storage_err)?)?,
        network: parse_network(&row.try_get::<String, _>("network").map_err(storage_err)?)?,
        l2_block_number: to_u64("l2_block_number", row.try_get("l2_block_number").map_err(storage_err)?)?,
        l2_output_index: opt_to_u64("l2_output_index", row.try_get("l2_output_index").map_err(storage_err)?)?,
        l2_block_hash: parse_opt_hash("l2_block_hash", row.try_get("l2_block_hash").map_err(storage_err)?)?,
        output_root: parse_hash("output_root", &row.try_get::<String, _>("output_root").map_err(storage_err)?)?,
        l1_block_number: to_u64("l1_block_number", row.try_get("l1_block_number").map_err(storage_err)?)?,
        l1_block_hash: parse_hash("l1_block_hash", &row.try_get::<String, _>("l1_block_hash").map_err(storage_err)?)?,
        l1_tx_hash: parse_hash("l1_tx_hash", &row.try_get::<String, _>("l1_tx_hash").map_err(storage_err)?)?,
        l1_tx_index: to_u64("l1_tx_index", row.try_get("l1_tx_index").map_err(storage_err)?)?,
        log_index: to_u64("log_index", row.try_get("log_index").map_err(storage_err)?)?,
        l1_timestamp: opt_to_u64("l1_timestamp", row.try_get("l1_timestamp").map_err(storage_err)?)?,
        observed_at: row.try_get::<DateTime<Utc>, _>("observed_at").map_err(storage_err)?,
    })
}

fn cursor_from_row(row: &SqliteRow) -> Result<Cursor, IndexerError> {
    Ok(Cursor {
        family: parse_family(&row.try_get::<String, _>("family").map_err(storage_err)?)?,
        network: parse_network(&row.try_get::<String, _>("network").map_err(storage_err)?)?,
        block_number: to_u64("block_number", row.try_get("block_number").map_err(storage_err)?)?,
        block_hash: parse_opt_hash("block_hash", row.try_get("block_hash").map_err(storage_err)?)?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at").map_err(storage_err)?,
    })
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn load_cursor(
        &self,
        family: ChainFamily,
        network: Network,
    ) -> Result<Option<Cursor>, IndexerError> {
        let row = sqlx::query(
            "SELECT family, network, block_number, block_hash, updated_at
             FROM l2_cursors WHERE family = ? AND network = ?",
        )
        .bind(family.as_str())
        .bind(network.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(cursor_from_row).transpose()
    }

    async fn list_cursors(&self) -> Result<Vec<Cursor>, IndexerError> {
        let rows = sqlx::query(
            "SELECT family, network, block_number, block_hash, updated_at
             FROM l2_cursors ORDER BY network",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(cursor_from_row).collect()
    }

    async fn apply_batch(
        &self,
        expected_block: u64,
        cursor: &Cursor,
        records: &[CheckpointRecord],
    ) -> Result<ApplyOutcome, IndexerError> {
        let network = cursor.network.to_string();
        let mut outcome = ApplyOutcome::default();
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Compare-and-swap first: the row lock also orders us against rewinds.
        let moved = sqlx::query(
            "INSERT INTO l2_cursors (family, network, block_number, block_hash, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (family, network) DO UPDATE SET
                block_number = excluded.block_number,
                block_hash   = excluded.block_hash,
                updated_at   = excluded.updated_at
             WHERE l2_cursors.block_number = ?",
        )
        .bind(cursor.family.as_str())
        .bind(&network)
        .bind(to_i64("block_number", cursor.block_number)?)
        .bind(cursor.block_hash.as_ref().map(hash_text))
        .bind(cursor.updated_at)
        .bind(to_i64("expected_block", expected_block)?)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .rows_affected();

        if moved == 0 {
            let row = sqlx::query(
                "SELECT block_number FROM l2_cursors WHERE family = ? AND network = ?",
            )
            .bind(cursor.family.as_str())
            .bind(&network)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
            let found = to_u64("block_number", row.try_get("block_number").map_err(storage_err)?)?;
            tx.rollback().await.map_err(storage_err)?;
            return Err(IndexerError::CursorMoved {
                network,
                expected: expected_block,
                found,
            });
        }

        for record in records {
            let inserted = sqlx::query(&format!(
                "INSERT INTO l2_checkpoints ({RECORD_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (network, l2_block_number) DO NOTHING"
            ))
            .bind(record.family.as_str())
            .bind(&network)
            .bind(to_i64("l2_block_number", record.l2_block_number)?)
            .bind(opt_to_i64("l2_output_index", record.l2_output_index)?)
            .bind(record.l2_block_hash.as_ref().map(hash_text))
            .bind(hash_text(&record.output_root))
            .bind(to_i64("l1_block_number", record.l1_block_number)?)
            .bind(hash_text(&record.l1_block_hash))
            .bind(hash_text(&record.l1_tx_hash))
            .bind(to_i64("l1_tx_index", record.l1_tx_index)?)
            .bind(to_i64("log_index", record.log_index)?)
            .bind(opt_to_i64("l1_timestamp", record.l1_timestamp)?)
            .bind(record.observed_at)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?
            .rows_affected();

            if inserted == 1 {
                outcome.inserted += 1;
                continue;
            }

            let existing = sqlx::query(
                "SELECT output_root, l1_block_number FROM l2_checkpoints
                 WHERE network = ? AND l2_block_number = ?",
            )
            .bind(&network)
            .bind(to_i64("l2_block_number", record.l2_block_number)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;

            let stored_root = parse_hash("output_root", &existing.try_get::<String, _>("output_root").map_err(storage_err)?)?;
            if stored_root == record.output_root {
                outcome.unchanged += 1;
                continue;
            }

            let stored_l1_block = to_u64("l1_block_number", existing.try_get("l1_block_number").map_err(storage_err)?)?;
            tx.rollback().await.map_err(storage_err)?;
            return Err(IndexerError::Conflict {
                network,
                l2_block_number: record.l2_block_number,
                stored_root,
                stored_l1_block,
                observed_root: record.output_root,
            });
        }

        tx.commit().await.map_err(storage_err)?;

        debug!(
            network = %network,
            cursor = cursor.block_number,
            inserted = outcome.inserted,
            unchanged = outcome.unchanged,
            "batch applied"
        );
        Ok(outcome)
    }

    async fn rewind(
        &self,
        family: ChainFamily,
        network: Network,
        to_block: u64,
    ) -> Result<u64, IndexerError> {
        let network_text = network.to_string();
        let to = to_i64("block_number", to_block)?;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query(
            "INSERT INTO l2_cursors (family, network, block_number, block_hash, updated_at)
             VALUES (?, ?, ?, NULL, ?)
             ON CONFLICT (family, network) DO UPDATE SET
                block_number = excluded.block_number,
                block_hash   = NULL,
                updated_at   = excluded.updated_at",
        )
        .bind(family.as_str())
        .bind(&network_text)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;

        let deleted = sqlx::query(
            "DELETE FROM l2_checkpoints WHERE network = ? AND l1_block_number > ?",
        )
        .bind(&network_text)
        .bind(to)
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?
        .rows_affected();

        tx.commit().await.map_err(storage_err)?;

        debug!(network = %network, to_block, deleted, "rewound storage");
        Ok(deleted)
    }

    async fn anchors_between(
        &self,
        network: Network,
        from: u64,
        to: u64,
    ) -> Result<Vec<L1Anchor>, IndexerError> {
        let rows = sqlx::query(
            "SELECT DISTINCT l1_block_number, l1_block_hash FROM l2_checkpoints
             WHERE network = ? AND l1_block_number BETWEEN ? AND ?
             ORDER BY l1_block_number",
        )
        .bind(network.to_string())
        .bind(to_i64("from", from)?)
        .bind(to_i64("to", to)?)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter()
            .map(|r| {
                Ok(L1Anchor {
                    block_number: to_u64("l1_block_number", r.try_get("l1_block_number").map_err(storage_err)?)?,
                    block_hash: parse_hash("l1_block_hash", &r.try_get::<String, _>("l1_block_hash").map_err(storage_err)?)?,
                })
            })
            .collect()
    }

    async fn find_checkpoint(
        &self,
        network: Network,
        l2_block_number: u64,
    ) -> Result<Option<CheckpointRecord>, IndexerError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM l2_checkpoints
             WHERE network = ? AND l2_block_number >= ?
             ORDER BY l2_block_number ASC LIMIT 1"
        ))
        .bind(network.to_string())
        .bind(to_i64("l2_block_number", l2_block_number)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn latest_checkpoint(
        &self,
        network: Network,
    ) -> Result<Option<CheckpointRecord>, IndexerError> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM l2_checkpoints
             WHERE network = ?
             ORDER BY l2_block_number DESC LIMIT 1"
        ))
        .bind(network.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn count(&self, network: Network) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM l2_checkpoints WHERE network = ?")
            .bind(network.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.try_get("cnt").map_err(storage_err)?;
        to_u64("cnt", cnt)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
