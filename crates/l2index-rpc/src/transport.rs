//! The `RpcTransport` trait, the core abstraction for all RPC endpoints.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// The central async trait every RPC transport must implement.
///
/// The trait is object-safe and is stored as `Arc<dyn RpcTransport>`; typed
/// calls live on [`crate::EthClient`].
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    ///
    /// A response carrying a JSON-RPC error object is still `Ok`; callers
    /// decide whether the error is worth retrying.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Return the transport's identifier (URL or name).
    fn url(&self) -> &str;
}
