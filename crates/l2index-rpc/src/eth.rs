//! Typed `eth_*` calls over any [`RpcTransport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

/// A log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(rename = "blockNumber", default, deserialize_with = "opt_quantity")]
    pub block_number: Option<u64>,
    #[serde(rename = "blockHash", default)]
    pub block_hash: Option<B256>,
    #[serde(rename = "transactionHash", default)]
    pub tx_hash: Option<B256>,
    #[serde(rename = "transactionIndex", default, deserialize_with = "opt_quantity")]
    pub tx_index: Option<u64>,
    #[serde(rename = "logIndex", default, deserialize_with = "opt_quantity")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// The part of a block the monitor cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    #[serde(deserialize_with = "quantity")]
    pub number: u64,
    pub hash: B256,
    #[serde(rename = "parentHash")]
    pub parent_hash: B256,
    #[serde(deserialize_with = "quantity")]
    pub timestamp: u64,
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16)
}

fn quantity<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let s = String::deserialize(d)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn opt_quantity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) => parse_hex_u64(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Thin typed client. Holds no chain state between calls.
pub struct EthClient {
    transport: Arc<dyn RpcTransport>,
    max_log_range: u64,
    next_id: AtomicU64,
}

impl EthClient {
    pub fn new(transport: Arc<dyn RpcTransport>, max_log_range: u64) -> Self {
        Self {
            transport,
            max_log_range,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn max_log_range(&self) -> u64 {
        self.max_log_range
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Call a method and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self.transport.send(JsonRpcRequest::new(id, method, params)).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        serde_json::from_value(result).map_err(TransportError::Deserialization)
    }

    /// Current head block number.
    pub async fn block_number(&self) -> Result<u64, TransportError> {
        let hex: String = self.call("eth_blockNumber", vec![]).await?;
        parse_hex_u64(&hex).map_err(|e| {
            TransportError::MalformedResponse(format!("eth_blockNumber returned '{hex}': {e}"))
        })
    }

    /// Logs emitted by `address` with one of `topic0s` in `from..=to`.
    pub async fn get_logs(
        &self,
        address: Address,
        topic0s: &[B256],
        from: u64,
        to: u64,
    ) -> Result<Vec<RpcLog>, TransportError> {
        if from > to {
            return Err(TransportError::InvalidRange {
                from,
                to,
                reason: "from is above to".into(),
            });
        }
        let width = to - from + 1;
        if width > self.max_log_range {
            return Err(TransportError::InvalidRange {
                from,
                to,
                reason: format!("{width} blocks exceeds max log range {}", self.max_log_range),
            });
        }

        let filter = json!({
            "address": address,
            "topics": [topic0s],
            "fromBlock": format!("{from:#x}"),
            "toBlock": format!("{to:#x}"),
        });
        self.call("eth_getLogs", vec![filter]).await
    }

    /// Block header by number; `None` if the node does not have it.
    pub async fn block_by_number(&self, number: u64) -> Result<Option<BlockHeader>, TransportError> {
        self.call("eth_getBlockByNumber", vec![json!(format!("{number:#x}")), json!(false)])
            .await
    }

    /// Block header by hash; `None` if the node does not know the hash.
    pub async fn block_by_hash(&self, hash: B256) -> Result<Option<BlockHeader>, TransportError> {
        self.call("eth_getBlockByHash", vec![json!(hash), json!(false)]).await
    }
}
