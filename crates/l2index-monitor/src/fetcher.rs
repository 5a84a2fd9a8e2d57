//! The RPC surface the scanner needs, and its implementation over [`EthClient`].
//!
//! Keeping these as traits lets the scanner and the monitor loop run against
//! scripted chains in tests.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use l2index_core::{BlockRange, DecodeError, IndexerError, RawLogEvent};
use l2index_rpc::{EthClient, RpcLog};

/// Read access to L1.
#[async_trait]
pub trait L1Rpc: Send + Sync {
    /// Current head block number.
    async fn head_block(&self) -> Result<u64, IndexerError>;

    /// Logs from `address` with the given topic0 in `range`.
    async fn logs(
        &self,
        address: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RpcLog>, IndexerError>;

    /// Canonical hash at `number`, `None` if the node does not have the block.
    async fn block_hash(&self, number: u64) -> Result<Option<B256>, IndexerError>;
}

/// Read access to L2, used to resolve Arbitrum block hashes.
#[async_trait]
pub trait L2Rpc: Send + Sync {
    /// Block number for `hash`, `None` if the node does not know it.
    async fn block_number_by_hash(&self, hash: B256) -> Result<Option<u64>, IndexerError>;
}

#[async_trait]
impl L1Rpc for EthClient {
    async fn head_block(&self) -> Result<u64, IndexerError> {
        Ok(self.block_number().await?)
    }

    async fn logs(
        &self,
        address: Address,
        topic0: B256,
        range: BlockRange,
    ) -> Result<Vec<RpcLog>, IndexerError> {
        Ok(self.get_logs(address, &[topic0], range.from, range.to).await?)
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, IndexerError> {
        Ok(self.block_by_number(number).await?.map(|b| b.hash))
    }
}

#[async_trait]
impl L2Rpc for EthClient {
    async fn block_number_by_hash(&self, hash: B256) -> Result<Option<u64>, IndexerError> {
        self.block_by_hash(hash)
            .await
            .map(|b| b.map(|b| b.number))
            .map_err(|e| IndexerError::TransientUnavailable(format!("L2 RPC: {e}")))
    }
}

/// Convert a log from `eth_getLogs` into the decoder's input.
///
/// Pending logs lack their position fields and are rejected.
pub fn raw_log(log: &RpcLog) -> Result<RawLogEvent, DecodeError> {
    Ok(RawLogEvent {
        address: log.address,
        topics: log.topics.clone(),
        data: log.data.clone(),
        block_number: log.block_number.ok_or(DecodeError::MissingField { field: "blockNumber" })?,
        block_hash: log.block_hash.ok_or(DecodeError::MissingField { field: "blockHash" })?,
        tx_hash: log.tx_hash.ok_or(DecodeError::MissingField { field: "transactionHash" })?,
        tx_index: log.tx_index.ok_or(DecodeError::MissingField { field: "transactionIndex" })?,
        log_index: log.log_index.ok_or(DecodeError::MissingField { field: "logIndex" })?,
    })
}
