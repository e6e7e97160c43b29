//! Core data types: exchange and ranking-kind enums, canonical ranking
//! records, raw payload envelopes and contract-code helpers.

pub mod contract;
pub mod enums;
pub mod payload;
pub mod ranking;

pub use contract::*;
pub use enums::*;
pub use payload::*;
pub use ranking::*;
