//! Ordered multi-endpoint failover with per-endpoint retry.
//!
//! Each call starts at the last endpoint that answered. Transient failures
//! are retried on that endpoint with exponential backoff; once its retries
//! are spent the call moves on to the next endpoint. An endpoint that rejects
//! the call outright (401, 404, a bad key) is skipped without retries. Only
//! errors caused by the request itself are returned immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::policy::RetryPolicy;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

pub struct FailoverClient {
    endpoints: Vec<Arc<dyn RpcTransport>>,
    retry: RetryPolicy,
    /// Index of the endpoint the next call starts with.
    active: AtomicUsize,
    /// Cuts retry waits short.
    shutdown: CancellationToken,
}

impl FailoverClient {
    pub fn new(endpoints: Vec<Arc<dyn RpcTransport>>, retry: RetryPolicy) -> Self {
        Self {
            endpoints,
            retry,
            active: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop waiting between retries once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// URL of the endpoint the next call will try first.
    pub fn active_url(&self) -> Option<&str> {
        let idx = self.active.load(Ordering::Relaxed);
        self.endpoints.get(idx).map(|e| e.url())
    }

    /// One attempt; a transient JSON-RPC error object counts as a failure.
    async fn attempt(
        endpoint: &dyn RpcTransport,
        req: &JsonRpcRequest,
    ) -> Result<JsonRpcResponse, TransportError> {
        let resp = endpoint.send(req.clone()).await?;
        match &resp.error {
            Some(err) if err.is_transient() => Err(TransportError::Rpc(err.clone())),
            _ => Ok(resp),
        }
    }
}

#[async_trait]
impl RpcTransport for FailoverClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let n = self.endpoints.len();
        if n == 0 {
            return Err(TransportError::Unavailable {
                endpoints: 0,
                last_error: "no endpoints configured".into(),
            });
        }

        let start = self.active.load(Ordering::Relaxed) % n;
        let mut last_error = String::new();

        for offset in 0..n {
            let idx = (start + offset) % n;
            let endpoint = self.endpoints[idx].as_ref();
            let mut attempt = 0u32;

            loop {
                match Self::attempt(endpoint, &req).await {
                    Ok(resp) => {
                        if idx != start {
                            tracing::info!(url = endpoint.url(), method = %req.method, "switched to endpoint");
                        }
                        self.active.store(idx, Ordering::Relaxed);
                        return Ok(resp);
                    }
                    Err(e) if e.is_retryable() => {
                        attempt += 1;
                        match self.retry.next_delay(attempt) {
                            Some(delay) => {
                                tracing::warn!(
                                    attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %e,
                                    url = endpoint.url(),
                                    method = %req.method,
                                    "retrying request"
                                );
                                tokio::select! {
                                    _ = self.shutdown.cancelled() => return Err(TransportError::Cancelled),
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                            None => {
                                tracing::warn!(
                                    attempt,
                                    error = %e,
                                    url = endpoint.url(),
                                    "endpoint exhausted, failing over"
                                );
                                last_error = e.to_string();
                                break;
                            }
                        }
                    }
                    Err(e) if e.is_request_error() => return Err(e),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            url = endpoint.url(),
                            method = %req.method,
                            "endpoint rejected request, failing over"
                        );
                        last_error = e.to_string();
                        break;
                    }
                }
            }
        }

        tracing::error!(endpoints = n, method = %req.method, last_error = %last_error, "all endpoints unavailable");
        Err(TransportError::Unavailable {
            endpoints: n,
            last_error,
        })
    }

    fn url(&self) -> &str {
        self.active_url().unwrap_or("failover")
    }
}
