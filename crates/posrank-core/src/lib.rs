//! # posrank-core
//!
//! Core crate for the futures position-ranking ingester, providing:
//!
//! - **Types** (`types`): exchanges, ranking kinds, canonical records, raw payloads, contract utils
//! - **Configuration** (`config`): JSON config deserialization and validation
//! - **Error types** (`error`): domain-specific `RankError` via thiserror
//! - **Queues** (`queue`): acknowledged work queues and stop tokens for pipeline stages
//! - **Store** (`store`): per-kind ranking collections over SQLite or memory
//! - **Time utilities** (`time_util`): trading-day calendar helpers
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod queue;
pub mod store;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
