//! Column encodings shared by the SQL backends.
//!
//! Hashes are stored as `0x`-prefixed lowercase hex TEXT, block numbers as
//! signed 64-bit integers.

use std::str::FromStr;

use alloy_primitives::B256;
use l2index_core::{ChainFamily, IndexerError, Network};

pub(crate) fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::StorageUnavailable(e.to_string())
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> IndexerError {
    IndexerError::Other(format!("corrupt value in column '{column}': {detail}"))
}

pub(crate) fn hash_text(hash: &B256) -> String {
    format!("{hash:#x}")
}

pub(crate) fn parse_hash(column: &str, text: &str) -> Result<B256, IndexerError> {
    B256::from_str(text).map_err(|e| corrupt(column, e))
}

pub(crate) fn parse_opt_hash(column: &str, text: Option<String>) -> Result<Option<B256>, IndexerError> {
    text.map(|t| parse_hash(column, &t)).transpose()
}

pub(crate) fn to_i64(column: &str, value: u64) -> Result<i64, IndexerError> {
    i64::try_from(value).map_err(|_| corrupt(column, format!("{value} exceeds i64")))
}

pub(crate) fn opt_to_i64(column: &str, value: Option<u64>) -> Result<Option<i64>, IndexerError> {
    value.map(|v| to_i64(column, v)).transpose()
}

pub(crate) fn to_u64(column: &str, value: i64) -> Result<u64, IndexerError> {
    u64::try_from(value).map_err(|_| corrupt(column, format!("negative value {value}")))
}

pub(crate) fn opt_to_u64(column: &str, value: Option<i64>) -> Result<Option<u64>, IndexerError> {
    value.map(|v| to_u64(column, v)).transpose()
}

pub(crate) fn parse_network(text: &str) -> Result<Network, IndexerError> {
    text.parse().map_err(|e| corrupt("network", e))
}

pub(crate) fn parse_family(text: &str) -> Result<ChainFamily, IndexerError> {
    text.parse().map_err(|e| corrupt("family", e))
}
