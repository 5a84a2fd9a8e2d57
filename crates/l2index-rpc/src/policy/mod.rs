//! Retry policy shared by endpoint failover and the monitor loop.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
