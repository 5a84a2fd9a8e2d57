//! l2index-rpc: the L1/L2 JSON-RPC layer for l2index.
//!
//! # Overview
//!
//! - [`RpcTransport`]: the async trait every transport implements
//! - [`HttpTransport`]: one `reqwest` POST per call, failures classified
//! - [`FailoverClient`]: ordered endpoints, per-endpoint retry, sticky failover
//! - [`EthClient`]: typed `eth_*` calls used by the scanner
//! - [`policy`] module: exponential backoff with random jitter
//!
//! ```text
//! EthClient → FailoverClient → [RetryPolicy] → HttpTransport (endpoint 1..n)
//! ```

pub mod error;
pub mod eth;
pub mod failover;
pub mod http;
pub mod policy;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use eth::{BlockHeader, EthClient, RpcLog};
pub use failover::FailoverClient;
pub use http::{HttpClientConfig, HttpTransport};
pub use policy::{RetryConfig, RetryPolicy};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcParam};
pub use transport::RpcTransport;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Build an [`EthClient`] over HTTP endpoints tried in order. Retry waits end
/// early once `shutdown` is cancelled.
pub fn eth_client(
    urls: &[String],
    retry: RetryConfig,
    request_timeout: Duration,
    max_log_range: u64,
    shutdown: CancellationToken,
) -> Result<EthClient, TransportError> {
    let config = HttpClientConfig { request_timeout };
    let endpoints = urls
        .iter()
        .filter(|u| !u.trim().is_empty())
        .map(|u| {
            HttpTransport::new(u.trim(), config.clone()).map(|t| Arc::new(t) as Arc<dyn RpcTransport>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let failover = FailoverClient::new(endpoints, RetryPolicy::new(retry)).with_shutdown(shutdown);
    Ok(EthClient::new(Arc::new(failover), max_log_range))
}
