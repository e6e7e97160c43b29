//! Document-store abstraction for ranking records.
//!
//! The store holds one collection per [`RankKind`], shared by all exchanges and
//! keyed by (date, symbol). A [`RankCollection`] handle is opened once per
//! pipeline stage and owned by that stage for its lifetime; writers never
//! share a handle, so no locking is needed above the backend.
//!
//! Backends:
//! - [`sqlite::SqliteStore`]: durable, one table per collection
//! - [`memory::MemoryStore`]: in-process, for tests and dry runs

pub mod memory;
pub mod sqlite;

use chrono::NaiveDate;

use crate::error::RankError;
use crate::types::{Exchange, RankKind, RankingRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Factory for per-kind collection handles.
pub trait RankStore: Send + Sync {
    /// Open a handle on the collection holding `kind` rankings, creating the
    /// collection and its (date, symbol) index if missing.
    fn open(&self, kind: RankKind) -> Result<Box<dyn RankCollection>, RankError>;
}

/// One kind-specific collection.
pub trait RankCollection: Send {
    fn kind(&self) -> RankKind;

    /// Collection name, for logs.
    fn name(&self) -> &str;

    /// Most recent stored date for `exchange`, or `None` if it has no documents.
    fn latest_date(&self, exchange: Exchange) -> Result<Option<NaiveDate>, RankError>;

    /// Replace the document at (date, symbol) or insert it. Idempotent.
    fn upsert(&mut self, record: &RankingRecord) -> Result<(), RankError>;

    /// Point lookup by the compound key.
    fn find(&self, date: NaiveDate, symbol: &str) -> Result<Option<RankingRecord>, RankError>;

    /// Number of stored documents.
    fn count(&self) -> Result<u64, RankError>;
}

/// Guard against routing a record into the wrong collection.
pub(crate) fn check_kind(collection: RankKind, record: &RankingRecord) -> Result<(), RankError> {
    if record.kind() != collection {
        return Err(RankError::Store(format!(
            "{} record {} routed to {collection} collection",
            record.kind(),
            record.symbol()
        )));
    }
    Ok(())
}
