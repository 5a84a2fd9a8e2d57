//! HTTP JSON-RPC transport backed by `reqwest`.
//!
//! One POST per call. Retrying and failover are layered on top by
//! [`crate::FailoverClient`]; this transport only classifies what went wrong.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Configuration for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Single-endpoint HTTP JSON-RPC transport.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Connection(format!("{}: {err}", self.url))
        }
    }
}

/// Map a non-success HTTP status to a transport error.
pub(crate) fn status_error(status: u16, provider: &str, body: String) -> TransportError {
    if status == 429 {
        TransportError::RateLimited {
            provider: provider.to_string(),
        }
    } else {
        TransportError::Http {
            status,
            provider: provider.to_string(),
            body,
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &self.url, body));
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(e))?;
        serde_json::from_slice::<JsonRpcResponse>(&bytes).map_err(|e| {
            TransportError::MalformedResponse(format!("{} ({}): {e}", self.url, req.method))
        })
    }

    fn url(&self) -> &str {
        &self.url
    }
}
