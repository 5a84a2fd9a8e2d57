//! l2index-core: foundation types for the rollup checkpoint monitor.
//!
//! # Architecture
//!
//! ```text
//! MonitorBuilder → Monitor (one per network)
//!                     ├── Scanner            (bounded, confirmation-safe block ranges)
//!                     ├── decoder            (opstack / arbitrum → DecodedCheckpoint)
//!                     ├── ReorgGuard         (hash re-check, rewind planning)
//!                     └── CheckpointStore    (memory / SQLite / Postgres)
//! ```
//!
//! This crate holds everything that is pure: chain descriptors, the normalized
//! data model, the family decoders, the cursor, rewind planning and the store
//! trait. Network I/O lives in `l2index-rpc`, persistence in `l2index-storage`.

pub mod chain;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod monitor;
pub mod reorg;
pub mod store;
pub mod types;

pub use chain::{ChainDescriptor, ChainFamily, ChainName, L1Network, Network};
pub use cursor::Cursor;
pub use decoder::decode;
pub use error::{DecodeError, IndexerError};
pub use monitor::{MonitorConfig, MonitorState, MonitorStatus, RetrySettings};
pub use reorg::{ReorgEvent, ReorgGuard, ReorgKind, RewindPlan};
pub use store::CheckpointStore;
pub use types::{
    ApplyOutcome, BlockRange, CheckpointRecord, DecodedCheckpoint, L1Anchor, L2Anchor,
    RawLogEvent,
};
