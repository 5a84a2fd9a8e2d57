//! l2index-monitor: scanning, reorg correction and the monitor loop.
//!
//! ```text
//! Supervisor ─┬─ Monitor (optimism_mainnet) ── Scanner ── L1Rpc / L2Rpc
//!             ├─ Monitor (base_sepolia)          │
//!             └─ ...                             └─ CheckpointStore
//! ```

pub mod builder;
pub mod fetcher;
pub mod monitor;
pub mod scanner;
pub mod supervisor;

pub use builder::MonitorBuilder;
pub use fetcher::{raw_log, L1Rpc, L2Rpc};
pub use monitor::{backfill, CycleOutcome, Monitor};
pub use scanner::{next_range, FetchedLogs, ScanOutput, Scanner, SkippedLog};
pub use supervisor::Supervisor;
